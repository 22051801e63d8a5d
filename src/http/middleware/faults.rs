use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

/// Logs every 5xx response and, when SMTP is configured, notifies the admin
/// list from a detached task so the response is never delayed by mail I/O.
pub async fn report_faults(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if response.status().is_server_error() {
        let status = response.status();
        tracing::error!(status = %status, method = %method, path = %path, "server fault");

        if let Some(mailer) = state.mailer.clone() {
            let subject = format!("murmur failure: {} {}", method, path);
            let body = format!("{} {} returned {}", method, path, status);
            tokio::spawn(async move {
                if let Err(err) = mailer.notify(&subject, &body).await {
                    tracing::warn!(error = ?err, "failed to send fault notification");
                }
            });
        }
    }

    response
}
