//! Transfer streamer: serves a ready job's file over the response channel.
//!
//! The file is never buffered whole; a `ReaderStream` feeds the body chunk
//! by chunk while this wrapper tracks the job state machine and byte
//! accounting. Cleanup rides on the job's own drop guard, so the backing
//! file is removed exactly once whether the send completes, fails midway,
//! or the client disconnects and the body is simply dropped.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use tokio_util::io::ReaderStream;

use super::error::{ApiError, ApiResult};
use crate::dispatch::{Job, JobStatus};

/// Build the streaming response for a job in the `Ready` state.
pub async fn stream_job(mut job: Job) -> ApiResult<Response> {
    debug_assert_eq!(job.status, JobStatus::Ready);

    let file = match tokio::fs::File::open(job.output_path()).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("Job {}: could not open output file: {}", job.id, e);
            job.advance(JobStatus::Failed);
            return Err(ApiError::Internal);
        }
    };

    let total = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            tracing::error!("Job {}: could not stat output file: {}", job.id, e);
            job.advance(JobStatus::Failed);
            return Err(ApiError::Internal);
        }
    };

    // Filename hint comes from the requested kind, never from whatever
    // name the extractor would have chosen.
    let filename = format!("{}.{}", job.kind.as_str(), job.kind.file_extension());
    let content_type = job.kind.mime_type();

    let stream = TransferStream {
        inner: ReaderStream::new(file),
        job,
        total,
        sent: 0,
    };

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, total.into());
    headers.insert(
        header::CONTENT_TYPE,
        content_type.parse().map_err(|_| ApiError::Internal)?,
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", filename)
            .parse()
            .map_err(|_| ApiError::Internal)?,
    );

    Ok(response)
}

/// Body stream that owns the job for the remainder of its lifetime.
struct TransferStream {
    inner: ReaderStream<tokio::fs::File>,
    job: Job,
    total: u64,
    sent: u64,
}

impl Stream for TransferStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if this.job.status == JobStatus::Ready {
                    this.job.advance(JobStatus::Streaming);
                }
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(
                    "Job {}: read failed after {}/{} bytes: {}",
                    this.job.id,
                    this.sent,
                    this.total,
                    e
                );
                this.job.advance(JobStatus::Failed);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if !matches!(this.job.status, JobStatus::Done | JobStatus::Failed) {
                    tracing::info!("Job {}: sent {} bytes", this.job.id, this.sent);
                    this.job.advance(JobStatus::Done);
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TransferStream {
    fn drop(&mut self) {
        // A drop before the terminal state means the connection went away
        // mid-send. The job's guard still removes the file after this.
        if !matches!(self.job.status, JobStatus::Done | JobStatus::Failed) {
            tracing::warn!(
                "Job {}: transfer aborted after {}/{} bytes",
                self.job.id,
                self.sent,
                self.total
            );
            self.job.advance(JobStatus::Failed);
        }
    }
}
