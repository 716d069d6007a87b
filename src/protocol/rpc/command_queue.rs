//! Ordered execution of the calls received on one connection.
//!
//! Records are submitted as soon as they are reassembled and executed one at
//! a time by a single worker task, so replies come out in the order the calls
//! came in even though every call is asynchronous.

use anyhow::anyhow;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::protocol::rpc;

/// One reassembled RPC record and the context to run it in.
#[derive(Debug)]
pub struct RpcCommand {
    pub data: Vec<u8>,
    pub context: rpc::Context,
}

/// Outcome of one call: the encoded reply, `None` when no reply is due
/// (retransmissions), or an error that ends the connection.
pub type CommandResult = anyhow::Result<Option<Vec<u8>>>;

/// Runs one call.
pub type CommandProcessor =
    fn(data: Vec<u8>, context: rpc::Context) -> BoxFuture<'static, CommandResult>;

#[derive(Debug, Clone)]
pub struct CommandQueue {
    command_sender: mpsc::UnboundedSender<RpcCommand>,
}

impl CommandQueue {
    /// Starts the worker. Results are sent to `result_sender` in submission
    /// order; the worker stops when either channel closes.
    pub fn new(
        processor: CommandProcessor,
        result_sender: mpsc::UnboundedSender<CommandResult>,
    ) -> Self {
        let (command_sender, mut command_receiver) = mpsc::unbounded_channel::<RpcCommand>();

        tokio::spawn(async move {
            while let Some(command) = command_receiver.recv().await {
                trace!("running {} byte call for {}", command.data.len(), command.context.client_addr);
                let result = processor(command.data, command.context).await;
                if let Err(e) = result_sender.send(result) {
                    error!("Failed to send command processing result: {:?}", e);
                    break;
                }
            }
            debug!("Command queue handler finished");
        });

        Self { command_sender }
    }

    pub fn submit_command(&self, data: Vec<u8>, context: rpc::Context) -> anyhow::Result<()> {
        self.command_sender
            .send(RpcCommand { data, context })
            .map_err(|e| anyhow!("Failed to send command: {}", e))
    }
}
