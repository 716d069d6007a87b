//! Record marking (RFC 5531 section 11) and call dispatch.
//!
//! On TCP every RPC message is a record made of one or more fragments. Each
//! fragment starts with a 4-byte big-endian header: the top bit marks the
//! last fragment of the record, the low 31 bits give the fragment length.

use std::io::{Cursor, Read, Write};

use anyhow::anyhow;
use futures::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::protocol::rpc::command_queue::{CommandQueue, CommandResult};
use crate::protocol::xdr::{self, deserialize, nfs4, Serialize};
use crate::protocol::{nfs, rpc};

const LAST_FRAGMENT: u32 = 1 << 31;
const MAX_FRAGMENT_SIZE: usize = (LAST_FRAGMENT - 1) as usize;
const DEFAULT_RESPONSE_BUFFER_CAPACITY: usize = 8192;

/// Checks the credentials of a call and stores them in `context`.
///
/// Returns the status to reject the call with, if any.
fn authenticate(
    call: &xdr::rpc::call_body,
    context: &mut rpc::Context,
) -> Option<xdr::rpc::auth_stat> {
    match call.cred.flavor {
        xdr::rpc::AUTH_NONE => {
            context.auth = xdr::rpc::auth_unix::default();
            None
        }
        xdr::rpc::AUTH_UNIX => match deserialize(&mut Cursor::new(&call.cred.body)) {
            Ok(auth) => {
                context.auth = auth;
                None
            }
            Err(e) => {
                warn!("Malformed AUTH_UNIX credentials: {}", e);
                Some(xdr::rpc::auth_stat::AUTH_BADCRED)
            }
        },
        flavor => {
            warn!("Unsupported auth flavor {}", flavor);
            Some(xdr::rpc::auth_stat::AUTH_TOOWEAK)
        }
    }
}

/// Decodes one RPC call from `input`, runs it and writes the reply to
/// `output`.
///
/// Returns `Ok(false)` when no reply must be sent, which is the case for
/// retransmissions. A REPLY message, or a call whose header cannot be
/// decoded, is an error and ends the connection.
pub async fn handle_rpc(
    input: &mut impl Read,
    output: &mut impl Write,
    mut context: rpc::Context,
) -> anyhow::Result<bool> {
    let recv = deserialize::<xdr::rpc::rpc_msg>(input)?;
    let xid = recv.xid;
    let xdr::rpc::rpc_body::CALL(call) = recv.body else {
        error!("Unexpectedly received a Reply instead of a Call");
        return Err(anyhow!("Bad RPC Call format"));
    };

    if call.rpcvers != xdr::rpc::RPC_VERSION {
        warn!("Invalid RPC version {} != {}", call.rpcvers, xdr::rpc::RPC_VERSION);
        xdr::rpc::rpc_vers_mismatch(xid).serialize(output)?;
        return Ok(true);
    }
    if let Some(stat) = authenticate(&call, &mut context) {
        xdr::rpc::auth_error_reply_message(xid, stat).serialize(output)?;
        return Ok(true);
    }

    if context.transaction_tracker.is_retransmission(xid, &context.client_addr) {
        debug!(
            "Retransmission detected, xid: {}, client_addr: {}, call: {:?}",
            xid, context.client_addr, call
        );
        return Ok(false);
    }

    let res = match call.prog {
        nfs4::PROGRAM => nfs::v4::handle_nfs(xid, call, input, output, &context).await,
        unknown => {
            warn!("Unknown RPC Program number {} != {}", unknown, nfs4::PROGRAM);
            xdr::rpc::prog_unavail_reply_message(xid).serialize(output).map_err(Into::into)
        }
    };
    context.transaction_tracker.mark_processed(xid, &context.client_addr);
    res.map(|()| true)
}

/// Reads one fragment and appends its payload to `append_to`.
///
/// Returns true if it was the last fragment of the record. Empty fragments
/// and records growing past `max_record_length` are errors.
async fn read_fragment(
    socket: &mut DuplexStream,
    append_to: &mut Vec<u8>,
    max_record_length: usize,
) -> anyhow::Result<bool> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = fragment_header & LAST_FRAGMENT != 0;
    let length = (fragment_header & !LAST_FRAGMENT) as usize;
    trace!("Reading fragment length:{}, last:{}", length, is_last);
    if length == 0 {
        return Err(anyhow!("RPC fragment of length zero"));
    }
    if append_to.len().saturating_add(length) > max_record_length {
        return Err(anyhow!(
            "RPC record length {} exceeds max {}",
            append_to.len().saturating_add(length),
            max_record_length
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(start_offset + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Writes `buf` as a record. Each fragment goes out as a single write of
/// header and payload.
pub async fn write_fragment(
    socket: &mut (impl AsyncWrite + Unpin),
    buf: &[u8],
) -> anyhow::Result<()> {
    let mut chunks = buf.chunks(MAX_FRAGMENT_SIZE).peekable();
    if chunks.peek().is_none() {
        socket.write_all(&LAST_FRAGMENT.to_be_bytes()).await?;
        return Ok(());
    }
    while let Some(chunk) = chunks.next() {
        let is_last = chunks.peek().is_none();
        let header = if is_last { chunk.len() as u32 | LAST_FRAGMENT } else { chunk.len() as u32 };
        let mut fragment = Vec::with_capacity(4 + chunk.len());
        fragment.extend_from_slice(&header.to_be_bytes());
        fragment.extend_from_slice(chunk);
        trace!("Writing fragment length:{}, last:{}", chunk.len(), is_last);
        socket.write_all(&fragment).await?;
    }
    Ok(())
}

pub type SocketMessageType = anyhow::Result<Vec<u8>>;

/// Reassembles records from one connection and feeds them to the ordered
/// command queue.
///
/// Bytes read from the socket are written into the returned `DuplexStream`;
/// encoded replies, in call order, arrive on the returned receiver.
#[derive(Debug)]
pub struct SocketMessageHandler {
    cur_fragment: Vec<u8>,
    socket_receive_channel: DuplexStream,
    context: rpc::Context,
    command_queue: CommandQueue,
    max_record_length: usize,
}

impl SocketMessageHandler {
    pub fn new(
        context: &rpc::Context,
    ) -> (Self, DuplexStream, mpsc::UnboundedReceiver<SocketMessageType>) {
        let (socksend, sockrecv) = tokio::io::duplex(256_000);
        let (msgsend, msgrecv) = mpsc::unbounded_channel();
        let (result_sender, mut result_receiver) = mpsc::unbounded_channel::<CommandResult>();
        let command_queue = CommandQueue::new(process_rpc_command, result_sender);

        tokio::spawn(async move {
            while let Some(result) = result_receiver.recv().await {
                match result {
                    Ok(Some(reply)) => {
                        let _ = msgsend.send(Ok(reply));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("RPC error: {:?}", e);
                        let _ = msgsend.send(Err(e));
                    }
                }
            }
            debug!("Command result handler finished");
        });

        (
            Self {
                cur_fragment: Vec::new(),
                socket_receive_channel: sockrecv,
                context: context.clone(),
                command_queue,
                max_record_length: context.state.config.max_record_length,
            },
            socksend,
            msgrecv,
        )
    }

    /// Reads one fragment; once a record is complete it is queued for
    /// execution. Meant to be called in a loop until it fails.
    pub async fn read(&mut self) -> anyhow::Result<()> {
        let is_last = read_fragment(
            &mut self.socket_receive_channel,
            &mut self.cur_fragment,
            self.max_record_length,
        )
        .await?;
        if is_last {
            let record = std::mem::take(&mut self.cur_fragment);
            self.command_queue.submit_command(record, self.context.clone())?;
        }
        Ok(())
    }
}

fn process_rpc_command(data: Vec<u8>, context: rpc::Context) -> BoxFuture<'static, CommandResult> {
    Box::pin(async move {
        let mut input = Cursor::new(data);
        let mut output = Cursor::new(Vec::with_capacity(DEFAULT_RESPONSE_BUFFER_CAPACITY));
        if handle_rpc(&mut input, &mut output, context).await? {
            Ok(Some(output.into_inner()))
        } else {
            Ok(None)
        }
    })
}
