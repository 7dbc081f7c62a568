use super::{ApiFailure, Context, ContextError};
use futures::{AsyncBufReadExt, Stream, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use tracing::debug;

impl Context {
    /// Stream logs from a pod in real-time
    ///
    /// Uses `follow: true` like `kubectl logs -f`; the stream ends when the
    /// container exits or the connection drops.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::TryStreamExt;
    ///
    /// let mut stream = ctx.logs_stream("test-runner").await?;
    /// while let Some(line) = stream.try_next().await? {
    ///     println!("{}", line);
    /// }
    /// ```
    pub async fn logs_stream(
        &self,
        pod_name: &str,
    ) -> Result<impl Stream<Item = Result<String, std::io::Error>> + '_, ContextError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), self.namespace());

        let params = LogParams {
            follow: true,
            ..Default::default()
        };

        debug!(
            namespace = %self.namespace(),
            pod = %pod_name,
            "Starting log stream"
        );

        let log_stream = pods
            .log_stream(pod_name, &params)
            .await
            .map_err(|e| ContextError::LogsError(ApiFailure::new(&e, "Pod", pod_name)))?;

        Ok(log_stream.lines())
    }

    /// Follow a pod's logs, handing each line to `sink` as it arrives
    ///
    /// Returns the number of lines forwarded once the stream closes.
    pub async fn follow_logs<F>(&self, pod_name: &str, sink: F) -> Result<usize, ContextError>
    where
        F: FnMut(&str),
    {
        let stream = self.logs_stream(pod_name).await?;
        let lines = forward_lines(stream, sink).await?;

        debug!(pod = %pod_name, lines, "Log stream closed");
        Ok(lines)
    }
}

/// Drain a line stream into `sink`, trimming trailing whitespace
pub async fn forward_lines<S, F>(stream: S, mut sink: F) -> Result<usize, std::io::Error>
where
    S: Stream<Item = Result<String, std::io::Error>>,
    F: FnMut(&str),
{
    futures::pin_mut!(stream);
    let mut count = 0;

    while let Some(line) = stream.try_next().await? {
        sink(line.trim_end());
        count += 1;
    }

    Ok(count)
}
