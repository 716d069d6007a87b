use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

mod support;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use nfs4_mamont::tcp::{NFSTcp, NFSTcpListener};
use nfs4_mamont::xdr::{self, nfs4, rpc};

use support::{rpc_call, MemStore};

async fn read_record(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0_u8; 4];
    stream.read_exact(&mut header).await.expect("read fragment header");
    let header = u32::from_be_bytes(header);
    assert!(header & (1 << 31) != 0, "reply must be a single fragment");
    let mut body = vec![0_u8; (header & !(1 << 31)) as usize];
    stream.read_exact(&mut body).await.expect("read fragment body");
    body
}

#[tokio::test]
async fn serves_null_over_tcp() {
    let listener = NFSTcpListener::bind("127.0.0.1:0", Arc::new(MemStore::new()))
        .await
        .expect("bind");
    let port = listener.get_listen_port();
    assert_ne!(port, 0);
    tokio::spawn(async move {
        let _ = listener.handle_forever().await;
    });

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    for xid in [1_u32, 2] {
        let msg = rpc_call(xid, 2, nfs4::PROGRAM, nfs4::VERSION, nfs4::NFSPROC4_NULL, &[]);
        stream.write_all(&((1_u32 << 31) | msg.len() as u32).to_be_bytes()).await.expect("write");
        stream.write_all(&msg).await.expect("write");

        let body = timeout(Duration::from_secs(1), read_record(&mut stream))
            .await
            .expect("reply timeout");
        let reply = xdr::deserialize::<rpc::rpc_msg>(&mut Cursor::new(body)).expect("reply");
        assert_eq!(reply.xid, xid);
        assert!(matches!(
            reply.body,
            rpc::rpc_body::REPLY(rpc::reply_body::MSG_ACCEPTED(rpc::accepted_reply {
                reply_data: rpc::accept_body::SUCCESS,
                ..
            }))
        ));
    }
}

#[tokio::test]
async fn rejects_malformed_bind_address() {
    let err = NFSTcpListener::bind("localhost", Arc::new(MemStore::new()))
        .await
        .err()
        .expect("bind must fail");
    assert_eq!(err.kind(), std::io::ErrorKind::AddrNotAvailable);
}
