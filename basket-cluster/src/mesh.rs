//! Server side of the replication mesh.
//!
//! Accepts peer connections and answers framed request/reply exchanges.
//! One task per connection; requests on a connection are handled strictly
//! in order, matching the single-in-flight contract of [`PeerChannel`].

use crate::channel::{read_frame, write_frame};
use crate::protocol::{NodeMessage, NodeReply};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, trace};

/// Something that can answer mesh requests (a storage node or the
/// coordinator).
#[async_trait]
pub trait MeshHandler: Send + Sync + 'static {
    async fn handle(&self, message: NodeMessage) -> NodeReply;
}

/// Runs the accept loop until the listener fails or the task is aborted.
///
/// Connection tasks live in a `JoinSet`, so cancelling the serve future
/// also closes every open peer socket.
pub async fn serve(listener: TcpListener, handler: Arc<dyn MeshHandler>) -> io::Result<()> {
    let mut connections = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                trace!(%peer, "mesh connection accepted");
                let handler = Arc::clone(&handler);
                connections.spawn(async move {
                    if let Err(e) = serve_connection(stream, handler).await {
                        debug!(%peer, error = %e, "mesh connection closed");
                    }
                });
            }
            Some(_) = connections.join_next() => {}
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    handler: Arc<dyn MeshHandler>,
) -> io::Result<()> {
    loop {
        let message: NodeMessage = match read_frame(&mut stream).await {
            Ok(message) => message,
            // Peer closed between exchanges
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        };
        let reply = handler.handle(message).await;
        write_frame(&mut stream, &reply).await?;
    }
}
