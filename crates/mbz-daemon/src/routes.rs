//! Axum router and all HTTP handlers for mbz-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. All handlers are `pub(crate)` so the
//! scenario tests in `tests/` can compose the router directly.
//!
//! Identity arrives from the out-of-scope auth layer as
//! `x-user-id` / `x-user-role` headers and is resolved exactly once per
//! request into a [`RequestActor`]; handlers never re-derive roles.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mbz_cart::CartState;
use mbz_checkout::{CheckoutError, CheckoutSubmission};
use mbz_orders::{notify_best_effort, Notification, StatusTransition, WorkflowError};
use mbz_schemas::{Actor, OrderRecord, OrderStatus, Role};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    api_types::{
        BuyerCounters, CartAddRequest, CartDetailResponse, CartItemView, CartRemoveRequest,
        CheckoutQuery, CheckoutResponse, ErrorResponse, HealthResponse, SellerCounters,
        WorkflowResponse,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/cart", get(cart_detail))
        .route("/v1/cart/add", post(cart_add))
        .route("/v1/cart/remove", post(cart_remove))
        .route("/v1/checkout", post(checkout))
        .route("/v1/orders/:id/request-complete", post(request_complete))
        .route("/v1/orders/:id/confirm-complete", post(confirm_complete))
        .route("/v1/orders/:id/cancel", post(cancel_order))
        .route("/v1/counters/seller", get(seller_counters))
        .route("/v1/counters/buyer", get(buyer_counters))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// RequestActor extractor
// ---------------------------------------------------------------------------

/// The acting party, resolved once from `x-user-id` / `x-user-role`.
pub struct RequestActor(pub Actor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestActor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Uuid>().ok());
        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match v {
                "buyer" => Some(Role::Buyer),
                "seller" => Some(Role::Seller),
                _ => None,
            });

        match (user_id, role) {
            (Some(user_id), Some(role)) => Ok(RequestActor(Actor { user_id, role })),
            _ => Err(err(
                StatusCode::UNAUTHORIZED,
                "missing or malformed x-user-id / x-user-role headers",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn err(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(msg))).into_response()
}

/// 500 with a logged cause; the body stays generic.
fn internal(what: &str, e: anyhow::Error) -> Response {
    error!(what, %e, "internal error");
    err(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn require_role(actor: &Actor, role: Role) -> Result<(), Response> {
    if actor.role != role {
        return Err(err(
            StatusCode::FORBIDDEN,
            format!("this operation requires the {} role", role.as_str()),
        ));
    }
    Ok(())
}

fn checkout_error_response(e: CheckoutError) -> Response {
    match e {
        CheckoutError::ItemNotInCart { .. } => err(StatusCode::NOT_FOUND, e.to_string()),
        CheckoutError::Invalid(issues) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "invalid submission".to_string(),
                issues: Some(issues),
            }),
        )
            .into_response(),
        CheckoutError::EmptyCart | CheckoutError::NothingSelected => {
            err(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

fn workflow_error_response(e: WorkflowError) -> Response {
    let status = match e {
        WorkflowError::NotFound => StatusCode::NOT_FOUND,
        WorkflowError::NotAuthorized => StatusCode::FORBIDDEN,
        WorkflowError::WrongState { .. } => StatusCode::CONFLICT,
    };
    err(status, e.to_string())
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Cart endpoints
// ---------------------------------------------------------------------------

pub(crate) async fn cart_add(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Json(req): Json<CartAddRequest>,
) -> Response {
    if let Err(resp) = require_role(&actor, Role::Buyer) {
        return resp;
    }

    let product = match mbz_db::get_product(&st.pool, req.product_id).await {
        Ok(Some(p)) => p,
        Ok(None) => return err(StatusCode::NOT_FOUND, "product not found"),
        Err(e) => return internal("cart_add product lookup", e),
    };

    let mut carts = st.carts.write().await;
    let cart = carts.entry(actor.user_id).or_default();
    cart.add(
        &product,
        req.quantity.unwrap_or(1),
        req.override_quantity.unwrap_or(false),
    );

    info!(buyer = %actor.user_id, product = %product.id, "cart/add");
    cart_summary(cart)
}

pub(crate) async fn cart_remove(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Json(req): Json<CartRemoveRequest>,
) -> Response {
    if let Err(resp) = require_role(&actor, Role::Buyer) {
        return resp;
    }

    // Mirror add: removing a product that never existed is 404, removing
    // one that simply is not in the cart is a no-op success.
    match mbz_db::get_product(&st.pool, req.product_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return err(StatusCode::NOT_FOUND, "product not found"),
        Err(e) => return internal("cart_remove product lookup", e),
    }

    let mut carts = st.carts.write().await;
    let cart = carts.entry(actor.user_id).or_default();
    cart.remove(req.product_id);

    info!(buyer = %actor.user_id, product = %req.product_id, "cart/remove");
    cart_summary(cart)
}

pub(crate) async fn cart_detail(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
) -> Response {
    if let Err(resp) = require_role(&actor, Role::Buyer) {
        return resp;
    }

    let cart = {
        let carts = st.carts.read().await;
        carts.get(&actor.user_id).cloned().unwrap_or_default()
    };

    let catalog = match mbz_db::get_products(&st.pool, &cart.product_ids()).await {
        Ok(c) => c,
        Err(e) => return internal("cart_detail catalog fetch", e),
    };

    let items: Vec<CartItemView> = cart
        .items(&catalog)
        .map(|item| CartItemView {
            product_id: item.product.id,
            title: item.product.title.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
        })
        .collect();

    (
        StatusCode::OK,
        Json(CartDetailResponse {
            items,
            total_quantity: cart.total_quantity(),
            total_price: cart.total_price(),
        }),
    )
        .into_response()
}

fn cart_summary(cart: &CartState) -> Response {
    (
        StatusCode::OK,
        Json(CartDetailResponse {
            items: Vec::new(),
            total_quantity: cart.total_quantity(),
            total_price: cart.total_price(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/checkout
// ---------------------------------------------------------------------------

pub(crate) async fn checkout(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Query(query): Query<CheckoutQuery>,
    Json(submission): Json<CheckoutSubmission>,
) -> Response {
    if let Err(resp) = require_role(&actor, Role::Buyer) {
        return resp;
    }

    let cart = {
        let carts = st.carts.read().await;
        carts.get(&actor.user_id).cloned().unwrap_or_default()
    };

    let catalog = match mbz_db::get_products(&st.pool, &cart.product_ids()).await {
        Ok(c) => c,
        Err(e) => return internal("checkout catalog fetch", e),
    };

    let outcome = match mbz_checkout::process(
        &cart,
        &catalog,
        query.product_id,
        actor.user_id,
        &submission,
    ) {
        Ok(outcome) => outcome,
        Err(e) => return checkout_error_response(e),
    };

    // Persist first, then commit the consumed cart back to the session.
    // A failed insert leaves the cart exactly as the buyer left it.
    let order_ids = match mbz_db::insert_orders(&st.pool, &outcome.orders).await {
        Ok(ids) => ids,
        Err(e) => return internal("checkout order insert", e),
    };

    {
        let mut carts = st.carts.write().await;
        carts.insert(actor.user_id, outcome.cart);
    }

    info!(
        buyer = %actor.user_id,
        orders = order_ids.len(),
        total = %outcome.total,
        "checkout accepted"
    );
    (
        StatusCode::OK,
        Json(CheckoutResponse {
            order_ids,
            total: outcome.total,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Workflow endpoints
// ---------------------------------------------------------------------------

pub(crate) async fn request_complete(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(order_id): Path<Uuid>,
) -> Response {
    run_workflow(
        &st,
        order_id,
        &actor,
        mbz_orders::request_complete,
        Some(Notification::buyer_confirmation_needed),
    )
    .await
}

pub(crate) async fn confirm_complete(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(order_id): Path<Uuid>,
) -> Response {
    run_workflow(
        &st,
        order_id,
        &actor,
        mbz_orders::confirm_complete,
        Some(Notification::seller_order_completed),
    )
    .await
}

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
    Path(order_id): Path<Uuid>,
) -> Response {
    // Cancellation notifies nobody: the seller sees the order disappear
    // from the pending counter.
    run_workflow(&st, order_id, &actor, mbz_orders::request_cancel, None).await
}

/// Shared workflow skeleton: load → guard → conditional update → notify.
///
/// The notification fires only when the conditional update reports the
/// single affected row, so a lost race can never double-notify.
async fn run_workflow(
    st: &AppState,
    order_id: Uuid,
    actor: &Actor,
    guard: fn(&OrderRecord, &Actor) -> Result<StatusTransition, WorkflowError>,
    notify_with: Option<fn(&OrderRecord, &str) -> Notification>,
) -> Response {
    let order = match mbz_db::get_order(&st.pool, order_id).await {
        Ok(Some(o)) => o,
        Ok(None) => return workflow_error_response(WorkflowError::NotFound),
        Err(e) => return internal("workflow order fetch", e),
    };

    let transition = match guard(&order, actor) {
        Ok(t) => t,
        Err(e) => return workflow_error_response(e),
    };

    let won = match mbz_db::transition_status(&st.pool, order_id, transition.from, transition.to)
        .await
    {
        Ok(won) => won,
        Err(e) => return internal("workflow transition", e),
    };

    if !won {
        // A concurrent caller got there first (or the order vanished).
        // Re-read for an accurate conflict message.
        let actual = match mbz_db::get_order(&st.pool, order_id).await {
            Ok(Some(o)) => o.status,
            Ok(None) => return workflow_error_response(WorkflowError::NotFound),
            Err(e) => return internal("workflow conflict re-read", e),
        };
        return workflow_error_response(WorkflowError::WrongState {
            expected: transition.from,
            actual,
        });
    }

    if let Some(compose) = notify_with {
        let title = match mbz_db::get_product(&st.pool, order.product_id).await {
            Ok(Some(p)) => p.title,
            // Order rows cascade with their product, but do not let a
            // lookup hiccup block the accepted transition.
            _ => "your order".to_string(),
        };
        notify_best_effort(st.notifier.as_ref(), compose(&order, &title));
    }

    info!(
        order = %order_id,
        from = %transition.from,
        to = %transition.to,
        actor = %actor.user_id,
        "order transition applied"
    );
    (
        StatusCode::OK,
        Json(WorkflowResponse {
            ok: true,
            status: transition.to,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Counter endpoints
// ---------------------------------------------------------------------------

pub(crate) async fn seller_counters(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
) -> Response {
    if let Err(resp) = require_role(&actor, Role::Seller) {
        return resp;
    }

    let pending =
        match mbz_db::count_seller_orders(&st.pool, actor.user_id, &[OrderStatus::Pending]).await
        {
            Ok(n) => n,
            Err(e) => return internal("seller pending counter", e),
        };
    let sales = match mbz_db::count_seller_orders(
        &st.pool,
        actor.user_id,
        &[OrderStatus::Waiting, OrderStatus::Completed],
    )
    .await
    {
        Ok(n) => n,
        Err(e) => return internal("seller sales counter", e),
    };

    (StatusCode::OK, Json(SellerCounters { pending, sales })).into_response()
}

pub(crate) async fn buyer_counters(
    State(st): State<Arc<AppState>>,
    RequestActor(actor): RequestActor,
) -> Response {
    if let Err(resp) = require_role(&actor, Role::Buyer) {
        return resp;
    }

    let waiting =
        match mbz_db::count_buyer_orders(&st.pool, actor.user_id, &[OrderStatus::Waiting]).await {
            Ok(n) => n,
            Err(e) => return internal("buyer waiting counter", e),
        };

    let cart_quantity = {
        let carts = st.carts.read().await;
        carts
            .get(&actor.user_id)
            .map(|c| c.total_quantity())
            .unwrap_or(0)
    };

    (
        StatusCode::OK,
        Json(BuyerCounters {
            waiting,
            cart_quantity,
        }),
    )
        .into_response()
}
