//! Client listener for the Strata daemon.
//!
//! Each TCP connection carries a sequence of postcard [`Request`] frames.
//! Every request is answered by zero or more data frames followed by
//! [`Frame::Done`]; failures become a [`Frame::Error`] before the `Done`.
//! A `watch` request keeps streaming until the client hangs up.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use strata_engine::{Dispatcher, ErrorKind, Frame, Reply, Request, StoreError, WatchRecord};
use strata_net::{NetError, read_frame, write_frame};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Accepts client connections and feeds their requests to a [`Dispatcher`].
#[derive(Clone)]
pub struct ClientServer {
    dispatcher: Arc<Dispatcher>,
}

impl fmt::Debug for ClientServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientServer").finish_non_exhaustive()
    }
}

impl ClientServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), NetError> {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("client listener stopping");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "client connected");
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            debug!(%peer, %e, "client connection closed with error");
                        }
                    });
                }
            }
        }
    }

    /// Serve requests on one connection until the client hangs up.
    pub async fn handle_connection<S>(&self, stream: S) -> Result<(), NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);
        loop {
            let request = match read_frame::<_, Request>(&mut reader).await {
                Ok(Some(request)) => request,
                Ok(None) => return Ok(()),
                Err(NetError::Serialization(e)) => {
                    // The stream is still aligned on frame boundaries.
                    warn!(%e, "undecodable request");
                    write_frame(
                        &mut writer,
                        &Frame::Error {
                            kind: ErrorKind::Malformed,
                            message: e,
                        },
                    )
                    .await?;
                    write_frame(&mut writer, &Frame::Done).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let action = request.action.name();
            match self.dispatcher.handle_request(request).await {
                Ok(reply) => write_reply(&mut writer, reply).await?,
                Err(e) => {
                    debug!(action, kind = ?e.kind(), %e, "request failed");
                    write_frame(&mut writer, &error_frame(&e)).await?;
                }
            }
            write_frame(&mut writer, &Frame::Done).await?;
        }
    }
}

fn error_frame(e: &StoreError) -> Frame {
    Frame::Error {
        kind: e.kind(),
        message: e.to_string(),
    }
}

/// Write the data frames of `reply`, without the closing `Done`.
async fn write_reply<W>(writer: &mut W, reply: Reply) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    match reply {
        Reply::Value(record) => write_frame(writer, &Frame::Value(record)).await,
        Reply::Written(record) => write_frame(writer, &Frame::Written(record)).await,
        Reply::Records(records) => write_frame(writer, &Frame::Records(records)).await,
        Reply::State(report) => write_frame(writer, &Frame::State(report)).await,
        Reply::Compacted(stats) => {
            let frame = Frame::Compacted {
                history_dropped: stats.history_dropped,
                tombstones_dropped: stats.tombstones_dropped,
            };
            write_frame(writer, &frame).await
        }
        Reply::Tree(mut items) => {
            while let Some(item) = items.next().await {
                match item {
                    Ok(item) => write_frame(writer, &Frame::Item(item)).await?,
                    Err(e) => {
                        write_frame(writer, &error_frame(&e)).await?;
                        break;
                    }
                }
            }
            Ok(())
        }
        // Runs until the client hangs up; the failed write drops the watch.
        Reply::Watch(mut items) => {
            while let Some(record) = items.next().await {
                let frame = match record {
                    Ok(WatchRecord::Item(item)) => Frame::Item(item),
                    Ok(WatchRecord::UpToDate) => Frame::UpToDate,
                    Ok(WatchRecord::Lagged { skipped }) => Frame::Lagged { skipped },
                    Err(e) => {
                        write_frame(writer, &error_frame(&e)).await?;
                        break;
                    }
                };
                write_frame(writer, &frame).await?;
            }
            Ok(())
        }
    }
}
