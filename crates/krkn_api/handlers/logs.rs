use actix_web::{get, rt, web::Data, web::Path, Error as ActixError, HttpRequest, HttpResponse};
use futures::StreamExt;
use kube::api::{Api, ListParams, LogParams};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::state::AppState;

/// Streams a running scenario job's pod logs over a websocket (spec
/// §4.6): upgrade happens before the pod lookup so a missing job still
/// gets a structured `ERROR:` frame rather than a bare HTTP error, the
/// kube byte stream is line-buffered and forwarded as text frames, and
/// the socket closes normally on EOF or silently on client disconnect.
/// Grounded on the teacher's `actix-ws` absence and the pack's
/// `log_stream` + compat-wrapped `ReaderStream` pattern.
#[get("/scenarios/run/{run_name}/jobs/{job_id}/logs")]
pub async fn stream(req: HttpRequest, state: Data<AppState>, path: Path<(String, String)>, body: actix_web::web::Payload) -> Result<HttpResponse, ActixError> {
    let (response, mut session, _msg_stream) = actix_ws::handle(&req, body)?;
    let (_run_name, job_id) = path.into_inner();
    let pods: Api<k8s_openapi::api::core::v1::Pod> = state.pods.clone();

    rt::spawn(async move {
        let selector = format!("job-name={job_id}");
        let pod_name = match pods.list(&ListParams::default().labels(&selector)).await {
            Ok(list) => list.items.into_iter().next().and_then(|p| p.metadata.name),
            Err(e) => {
                let _ = session.text(format!("ERROR: {e}")).await;
                let _ = session.close(None).await;
                return;
            }
        };

        let Some(pod_name) = pod_name else {
            let _ = session.text(format!("ERROR: no pod found for job `{job_id}`")).await;
            let _ = session.close(None).await;
            return;
        };

        let lp = LogParams {
            follow: true,
            ..Default::default()
        };
        let stream = match pods.log_stream(&pod_name, &lp).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = session.text(format!("ERROR: {e}")).await;
                let _ = session.close(None).await;
                return;
            }
        };

        let mut lines = ReaderStream::new(stream.compat());
        loop {
            match lines.next().await {
                Some(Ok(chunk)) => {
                    let text = String::from_utf8_lossy(&chunk);
                    for line in text.lines() {
                        if session.text(line.to_string()).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(pod = pod_name, error = %e, "log stream read error");
                    let _ = session.text(format!("ERROR: {e}")).await;
                    break;
                }
                None => break,
            }
        }
        let _ = session.close(None).await;
    });

    Ok(response)
}
