//! Real-time gateway transport: handshake admission and WebSocket upgrade

use crate::api::rest::state::AppState;
use crate::error::ApiError;
use crate::gateway::{Admission, Claims, Gateway, HandshakeAuth, RejectReason};
use axum::{
    extract::{ws::WebSocketUpgrade, Query, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use std::sync::Arc;

/// Admit or refuse the handshake before any upgrade happens.
///
/// Admitted requests carry the verified [`Claims`] as an extension. A query
/// string that does not parse is refused as an invalid token.
pub async fn authenticate_handshake(
    State(gateway): State<Arc<Gateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    let admission = match Query::<HandshakeAuth>::try_from_uri(request.uri()) {
        Ok(Query(auth)) => {
            let authorization = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            gateway.admit(auth.token.as_deref(), authorization)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable handshake query");
            Admission::Rejected {
                reason: RejectReason::InvalidToken,
            }
        }
    };

    match admission {
        Admission::Admitted { claims } => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Admission::Rejected { reason } => {
            tracing::warn!(reason = %reason, "Real-time handshake rejected");
            ApiError::Unauthorized(reason).into_response()
        }
    }
}

/// Complete the handshake and hand the socket to the gateway
pub async fn realtime_upgrade(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> Response {
    let gateway = state.gateway.clone();
    ws.on_upgrade(move |socket| async move { gateway.serve(socket, claims).await })
}
