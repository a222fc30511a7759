// src/batch/probe.rs

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::resource::ResourceNode;

/// Check that something accepts TCP connections on the node's `host:port`.
///
/// Gives up after `limit`; the error string says why.
pub async fn probe_node(node: &ResourceNode, limit: Duration) -> Result<(), String> {
    match timeout(limit, TcpStream::connect(node.url.as_str())).await {
        Ok(Ok(_stream)) => {
            debug!(node_id = %node.node_id, url = %node.url, "node is alive");
            Ok(())
        }
        Ok(Err(e)) => Err(format!("connect to {} failed: {e}", node.url)),
        Err(_) => Err(format!(
            "connect to {} timed out after {}ms",
            node.url,
            limit.as_millis()
        )),
    }
}
