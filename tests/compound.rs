use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod support;

use async_trait::async_trait;

use nfs4_mamont::protocol::nfs::v4::{execute_compound, HandlerRegistry, OperationHandler};
use nfs4_mamont::state::{CompoundSession, ServerState};
use nfs4_mamont::xdr::nfs4::attr::{self, Attribute};
use nfs4_mamont::xdr::nfs4::ops::*;
use nfs4_mamont::xdr::nfs4::{
    bitmap4, fattr4, nfs_fh4, nfs_ftype4, nfs_opnum4, nfsstat4, stateid4, verifier4,
};
use nfs4_mamont::xdr::rpc::auth_unix;
use nfs4_mamont::xdr::{self, Serialize};

use support::{run, run_in, server_state, server_state_with_registry, MemStore, GENERATION};

fn statuses(res: &COMPOUND4res) -> Vec<nfsstat4> {
    res.resarray.iter().map(|r| r.status).collect()
}

fn file_handle(res: &COMPOUND4res) -> nfs_fh4 {
    res.resarray
        .iter()
        .find_map(|r| match &r.resok {
            resok4::GETFH(fh) => Some(fh.clone()),
            _ => None,
        })
        .expect("GETFH result")
}

fn lookup(name: &str) -> nfs_argop4 {
    nfs_argop4::OP_LOOKUP(LOOKUP4args { objname: name.to_string() })
}

fn getattr(ids: &[u32]) -> nfs_argop4 {
    nfs_argop4::OP_GETATTR(GETATTR4args { attr_request: bitmap4::from_ids(ids) })
}

fn putfh(fh: &nfs_fh4) -> nfs_argop4 {
    nfs_argop4::OP_PUTFH(PUTFH4args { object: fh.clone() })
}

fn attributes(res: &COMPOUND4res) -> Vec<Attribute> {
    let attrs = res
        .resarray
        .iter()
        .find_map(|r| match &r.resok {
            resok4::GETATTR(attrs) => Some(attrs.clone()),
            _ => None,
        })
        .expect("GETATTR result");
    attr::decode_attributes(&attrs).expect("decode attributes")
}

fn readdir(cookie: u64, cookieverf: verifier4, maxcount: u32) -> nfs_argop4 {
    nfs_argop4::OP_READDIR(READDIR4args {
        cookie,
        cookieverf,
        dircount: maxcount,
        maxcount,
        attr_request: bitmap4::new(),
    })
}

fn readdir_names(res: &COMPOUND4res) -> (Vec<(u64, String)>, bool) {
    match &res.resarray.last().expect("READDIR result").resok {
        resok4::READDIR(ok) => (
            ok.reply.entries.iter().map(|e| (e.cookie, e.name.clone())).collect(),
            ok.reply.eof,
        ),
        other => panic!("expected READDIR, got {:?}", other),
    }
}

async fn establish_client(state: &ServerState) -> u64 {
    let res = run(
        state,
        vec![nfs_argop4::OP_SETCLIENTID(SETCLIENTID4args {
            client: nfs_client_id4 { verifier: [1; 8], id: b"client-1".to_vec() },
            ..SETCLIENTID4args::default()
        })],
    )
    .await;
    let resok4::SETCLIENTID(ok) = &res.resarray[0].resok else {
        panic!("expected SETCLIENTID result, got {:?}", res.resarray[0]);
    };
    let clientid = ok.clientid;
    let res = run(
        state,
        vec![nfs_argop4::OP_SETCLIENTID_CONFIRM(SETCLIENTID_CONFIRM4args {
            clientid,
            setclientid_confirm: ok.setclientid_confirm,
        })],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    clientid
}

fn open_args(clientid: u64, name: &str, share_access: u32, openhow: openflag4) -> nfs_argop4 {
    nfs_argop4::OP_OPEN(OPEN4args {
        seqid: 1,
        share_access,
        share_deny: 0,
        owner: open_owner4 { clientid, owner: b"owner".to_vec() },
        openhow,
        claim: open_claim4::CLAIM_NULL(name.to_string()),
    })
}

fn open_result(res: &COMPOUND4res) -> OPEN4resok {
    res.resarray
        .iter()
        .find_map(|r| match &r.resok {
            resok4::OPEN(ok) => Some(ok.clone()),
            _ => None,
        })
        .expect("OPEN result")
}

/// Counts its invocations and answers with a fixed status.
struct Recording {
    calls: Arc<AtomicUsize>,
    status: nfsstat4,
}

#[async_trait]
impl OperationHandler for Recording {
    async fn handle(
        &self,
        _state: &ServerState,
        _session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.status == nfsstat4::NFS4_OK {
            nfs_resop4::void(args.opnum())
        } else {
            nfs_resop4::error(args.opnum(), self.status)
        }
    }
}

#[tokio::test]
async fn empty_compound_succeeds() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(&state, vec![]).await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(res.tag, "test");
    assert!(res.resarray.is_empty());
}

#[tokio::test]
async fn putrootfh_sets_root_handle() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, nfs_argop4::OP_GETFH]).await;
    assert_eq!(statuses(&res), vec![nfsstat4::NFS4_OK, nfsstat4::NFS4_OK]);
    let fh = file_handle(&res);
    assert_eq!(fh, state.root_handle());
    assert_eq!(&fh.as_bytes()[..8], &GENERATION.to_be_bytes());

    let res = run(&state, vec![nfs_argop4::OP_PUTPUBFH, nfs_argop4::OP_GETFH]).await;
    assert_eq!(file_handle(&res), fh);
}

#[tokio::test]
async fn getattr_without_file_handle_fails() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(&state, vec![getattr(&[attr::FATTR4_SIZE]), nfs_argop4::OP_GETFH]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOFILEHANDLE);
    assert_eq!(res.resarray.len(), 1);
    assert_eq!(res.resarray[0].resop, nfs_opnum4::OP_GETATTR);
    assert_eq!(res.resarray[0].resok, resok4::Void);
}

#[tokio::test]
async fn stops_at_first_failure() {
    let failing = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::empty();
    registry
        .register(
            nfs_opnum4::OP_PUTROOTFH,
            Arc::new(Recording { calls: failing.clone(), status: nfsstat4::NFS4ERR_IO }),
        )
        .register(
            nfs_opnum4::OP_GETFH,
            Arc::new(Recording { calls: after.clone(), status: nfsstat4::NFS4_OK }),
        );
    let state = server_state_with_registry(Arc::new(MemStore::new()), registry);

    let res = run(&state, vec![nfs_argop4::OP_GETFH, nfs_argop4::OP_PUTROOTFH, nfs_argop4::OP_GETFH])
        .await;
    assert_eq!(statuses(&res), vec![nfsstat4::NFS4_OK, nfsstat4::NFS4ERR_IO]);
    assert_eq!(res.status, nfsstat4::NFS4ERR_IO);
    assert_eq!(failing.load(Ordering::SeqCst), 1);
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unregistered_operation_is_not_supported() {
    let state = server_state_with_registry(Arc::new(MemStore::new()), HandlerRegistry::empty());
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOTSUPP);
    assert_eq!(res.resarray[0].resop, nfs_opnum4::OP_PUTROOTFH);
}

#[tokio::test]
async fn rejects_other_minor_versions() {
    let state = server_state(Arc::new(MemStore::new()));
    let body = support::compound_body(1, &[nfs_argop4::OP_PUTROOTFH]);
    let mut input = Cursor::new(body);
    let header = xdr::deserialize::<COMPOUND4args_header>(&mut input).expect("header");
    let mut session = CompoundSession::default();
    let res = execute_compound(&state, &mut session, &header, &mut input).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_MINOR_VERS_MISMATCH);
    assert!(res.resarray.is_empty());
}

#[tokio::test]
async fn illegal_operation_ends_compound() {
    let state = server_state(Arc::new(MemStore::new()));
    let header = COMPOUND4args_header { tag: String::new(), minorversion: 0, numops: 3 };
    let mut body = Vec::new();
    nfs_argop4::OP_PUTROOTFH.serialize(&mut body).expect("serialize");
    9999_u32.serialize(&mut body).expect("serialize");
    nfs_argop4::OP_GETFH.serialize(&mut body).expect("serialize");

    let mut session = CompoundSession::default();
    let res = execute_compound(&state, &mut session, &header, &mut Cursor::new(body)).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_OP_ILLEGAL);
    assert_eq!(res.resarray.len(), 2);
    assert_eq!(res.resarray[1].resop, nfs_opnum4::OP_ILLEGAL);
}

#[tokio::test]
async fn truncated_compound_is_badxdr() {
    let state = server_state(Arc::new(MemStore::new()));
    let header = COMPOUND4args_header { tag: String::new(), minorversion: 0, numops: 2 };
    let mut body = Vec::new();
    nfs_argop4::OP_PUTROOTFH.serialize(&mut body).expect("serialize");
    // LOOKUP with its name missing.
    (nfs_opnum4::OP_LOOKUP as u32).serialize(&mut body).expect("serialize");

    let mut session = CompoundSession::default();
    let res = execute_compound(&state, &mut session, &header, &mut Cursor::new(body)).await;
    assert_eq!(statuses(&res), vec![nfsstat4::NFS4_OK, nfsstat4::NFS4ERR_BADXDR]);
    assert_eq!(res.resarray[1].resop, nfs_opnum4::OP_LOOKUP);
}

#[tokio::test]
async fn lookup_errors() {
    let store = Arc::new(MemStore::new());
    store.add_file("/file", b"x");
    let state = server_state(store);

    let cases = [
        ("missing", nfsstat4::NFS4ERR_NOENT),
        (".", nfsstat4::NFS4ERR_BADNAME),
        ("..", nfsstat4::NFS4ERR_BADNAME),
        ("", nfsstat4::NFS4ERR_INVAL),
        ("a/b", nfsstat4::NFS4ERR_INVAL),
    ];
    for (name, expected) in cases {
        let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup(name)]).await;
        assert_eq!(res.status, expected, "lookup of {:?}", name);
    }

    let long_name = "n".repeat(256);
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup(&long_name)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NAMETOOLONG);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup("file"), lookup("x")]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOTDIR);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, nfs_argop4::OP_LOOKUPP]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOENT);
}

#[tokio::test]
async fn lookup_and_lookupp_walk_the_tree() {
    let store = Arc::new(MemStore::new());
    store.add_dir("/dir");
    store.add_file("/dir/file", b"x");
    let state = server_state(store);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("dir"),
            lookup("file"),
            nfs_argop4::OP_LOOKUPP,
            nfs_argop4::OP_LOOKUPP,
            nfs_argop4::OP_GETFH,
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(file_handle(&res), state.root_handle());
}

#[tokio::test]
async fn putfh_rejects_foreign_handles() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(&state, vec![putfh(&nfs_fh4(vec![1, 2, 3]))]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_BADHANDLE);

    let mut other_generation = state.root_handle();
    other_generation.0[0] ^= 0xff;
    let res = run(&state, vec![putfh(&other_generation)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_STALE);
}

#[tokio::test]
async fn putfh_rejects_oversized_handles() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(&state, vec![putfh(&nfs_fh4(vec![0; 129]))]).await;
    assert_eq!(res.resarray.len(), 1);
    assert_eq!(res.resarray[0].resop, nfs_opnum4::OP_PUTFH);
    assert_eq!(res.status, nfsstat4::NFS4ERR_BADXDR);
}

#[tokio::test]
async fn invalidated_handle_is_stale() {
    let store = Arc::new(MemStore::new());
    store.add_file("/a", b"data");
    let state = server_state(store.clone());

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup("a"), nfs_argop4::OP_GETFH]).await;
    let fh = file_handle(&res);
    state.handles.invalidate(&fh);

    let res = run(&state, vec![putfh(&fh), nfs_argop4::OP_GETFH]).await;
    assert_eq!(statuses(&res), vec![nfsstat4::NFS4ERR_STALE]);
    assert!(store.exists("/a"));
}

#[tokio::test]
async fn vanished_object_makes_handle_stale() {
    let store = Arc::new(MemStore::new());
    store.add_file("/a", b"data");
    let state = server_state(store.clone());

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup("a"), nfs_argop4::OP_GETFH]).await;
    let fh = file_handle(&res);
    store.delete("/a");

    let res = run(&state, vec![putfh(&fh), getattr(&[attr::FATTR4_SIZE])]).await;
    assert_eq!(statuses(&res), vec![nfsstat4::NFS4_OK, nfsstat4::NFS4ERR_STALE]);

    // The handle was forgotten, so even a new object at the same path does
    // not revive it.
    store.add_file("/a", b"new");
    let res = run(&state, vec![putfh(&fh)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_STALE);
}

#[tokio::test]
async fn getattr_reports_supported_attributes_only() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"hello");
    let state = server_state(store);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("f"),
            getattr(&[
                attr::FATTR4_TYPE,
                attr::FATTR4_SIZE,
                attr::FATTR4_MODE,
                attr::FATTR4_OWNER,
                attr::FATTR4_LEASE_TIME,
                attr::FATTR4_TIME_MODIFY_SET,
                12,
            ]),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(
        attributes(&res),
        vec![
            Attribute::Type(nfs_ftype4::NF4REG),
            Attribute::Size(5),
            Attribute::LeaseTime(90),
            Attribute::Mode(0o644),
            Attribute::Owner("1000".to_string()),
        ]
    );
}

#[tokio::test]
async fn setattr_applies_mode() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"hello");
    let state = server_state(store);

    let attrs = attr::encode_attributes(vec![Attribute::Mode(0o600)]).expect("encode");
    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("f"),
            nfs_argop4::OP_SETATTR(SETATTR4args {
                stateid: stateid4::default(),
                obj_attributes: attrs,
            }),
            getattr(&[attr::FATTR4_MODE]),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(res.resarray[2].resok, resok4::SETATTR(bitmap4::from_ids(&[attr::FATTR4_MODE])));
    assert_eq!(attributes(&res), vec![Attribute::Mode(0o600)]);
}

#[tokio::test]
async fn failed_setattr_reports_empty_bitmap() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"hello");
    let state = server_state(store);

    let read_only = attr::encode_attributes(vec![Attribute::Size(1), Attribute::FileId(3)])
        .expect("encode");
    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("f"),
            nfs_argop4::OP_SETATTR(SETATTR4args {
                stateid: stateid4::default(),
                obj_attributes: read_only,
            }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_INVAL);
    assert_eq!(res.resarray[2].resok, resok4::SETATTR(bitmap4::new()));

    let truncate = attr::encode_attributes(vec![Attribute::Size(0)]).expect("encode");
    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            nfs_argop4::OP_SETATTR(SETATTR4args {
                stateid: stateid4::default(),
                obj_attributes: truncate,
            }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_ISDIR);
    assert_eq!(res.resarray[1].resok, resok4::SETATTR(bitmap4::new()));
}

#[tokio::test]
async fn access_follows_mode_bits() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"hello");
    let state = server_state(store);
    let wanted = ACCESS4_READ | ACCESS4_MODIFY | ACCESS4_EXECUTE | ACCESS4_LOOKUP;
    let ops = || {
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("f"),
            nfs_argop4::OP_ACCESS(ACCESS4args { access: wanted }),
        ]
    };
    let granted = |res: &COMPOUND4res| match &res.resarray[2].resok {
        resok4::ACCESS(ok) => ok.clone(),
        other => panic!("expected ACCESS, got {:?}", other),
    };

    let mut owner = CompoundSession::new(
        auth_unix { uid: 1000, gid: 1000, ..auth_unix::default() },
        "127.0.0.1:1",
    );
    let res = run_in(&state, &mut owner, ops()).await;
    let supported = ACCESS4_READ | ACCESS4_MODIFY | ACCESS4_EXECUTE;
    assert_eq!(
        granted(&res),
        ACCESS4resok { supported, access: ACCESS4_READ | ACCESS4_MODIFY }
    );

    let mut other = CompoundSession::new(
        auth_unix { uid: 2000, gid: 2000, ..auth_unix::default() },
        "127.0.0.1:2",
    );
    let res = run_in(&state, &mut other, ops()).await;
    assert_eq!(granted(&res), ACCESS4resok { supported, access: ACCESS4_READ });

    let res = run(&state, ops()).await;
    assert_eq!(granted(&res), ACCESS4resok { supported, access: supported });
}

#[tokio::test]
async fn create_makes_directories_only() {
    let store = Arc::new(MemStore::new());
    let state = server_state(store.clone());

    let mkdir = |name: &str, objtype: nfs_ftype4| {
        nfs_argop4::OP_CREATE(CREATE4args {
            objtype: createtype4::Other(objtype),
            objname: name.to_string(),
            createattrs: fattr4::default(),
        })
    };

    let res = run(
        &state,
        vec![nfs_argop4::OP_PUTROOTFH, mkdir("sub", nfs_ftype4::NF4DIR), nfs_argop4::OP_GETFH],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert!(store.exists("/sub"));
    let resok4::CREATE(ok) = &res.resarray[1].resok else {
        panic!("expected CREATE result");
    };
    assert_ne!(ok.cinfo.before, ok.cinfo.after);
    assert_eq!(file_handle(&res), state.handles.lookup("/sub").expect("handle"));

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, mkdir("sub", nfs_ftype4::NF4DIR)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_EXIST);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, mkdir("f", nfs_ftype4::NF4REG)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_BADTYPE);
}

#[tokio::test]
async fn remove_forgets_handles() {
    let store = Arc::new(MemStore::new());
    store.add_dir("/dir");
    store.add_file("/dir/f", b"x");
    let state = server_state(store.clone());

    let res = run(
        &state,
        vec![nfs_argop4::OP_PUTROOTFH, lookup("dir"), lookup("f"), nfs_argop4::OP_GETFH],
    )
    .await;
    let fh = file_handle(&res);

    let remove = |name: &str| nfs_argop4::OP_REMOVE(REMOVE4args { target: name.to_string() });
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, remove("dir")]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOTEMPTY);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup("dir"), remove("f")]).await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert!(!store.exists("/dir/f"));
    let res = run(&state, vec![putfh(&fh)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_STALE);
}

#[tokio::test]
async fn rename_keeps_file_handles() {
    let store = Arc::new(MemStore::new());
    store.add_dir("/src");
    store.add_dir("/dst");
    store.add_file("/src/f", b"payload");
    let state = server_state(store.clone());

    let res = run(
        &state,
        vec![nfs_argop4::OP_PUTROOTFH, lookup("src"), lookup("f"), nfs_argop4::OP_GETFH],
    )
    .await;
    let fh = file_handle(&res);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("src"),
            nfs_argop4::OP_SAVEFH,
            nfs_argop4::OP_PUTROOTFH,
            lookup("dst"),
            nfs_argop4::OP_RENAME(RENAME4args {
                oldname: "f".to_string(),
                newname: "g".to_string(),
            }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    let resok4::RENAME(ok) = &res.resarray[5].resok else {
        panic!("expected RENAME result");
    };
    assert_ne!(ok.source_cinfo.before, ok.source_cinfo.after);
    assert_ne!(ok.target_cinfo.before, ok.target_cinfo.after);
    assert!(store.exists("/dst/g"));
    assert!(!store.exists("/src/f"));

    let res = run(&state, vec![putfh(&fh), getattr(&[attr::FATTR4_SIZE])]).await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(attributes(&res), vec![Attribute::Size(7)]);
}

#[tokio::test]
async fn rename_into_own_subtree_is_invalid() {
    let store = Arc::new(MemStore::new());
    store.add_dir("/a");
    let state = server_state(store);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            nfs_argop4::OP_SAVEFH,
            lookup("a"),
            nfs_argop4::OP_RENAME(RENAME4args {
                oldname: "a".to_string(),
                newname: "b".to_string(),
            }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_INVAL);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            nfs_argop4::OP_RENAME(RENAME4args {
                oldname: "a".to_string(),
                newname: "b".to_string(),
            }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOFILEHANDLE);
}

#[tokio::test]
async fn restorefh_without_saved_handle_fails() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, nfs_argop4::OP_RESTOREFH]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_RESTOREFH);
}

#[tokio::test]
async fn readdir_pages_with_cookies() {
    let store = Arc::new(MemStore::new());
    for name in ["a", "b", "c", "d"] {
        store.add_file(&format!("/{name}"), b"");
    }
    let state = server_state(store);
    let verf = GENERATION.to_be_bytes();

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(0, [0; 8], 8192)]).await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    let (entries, eof) = readdir_names(&res);
    assert!(eof);
    assert_eq!(
        entries,
        vec![
            (3, "a".to_string()),
            (4, "b".to_string()),
            (5, "c".to_string()),
            (6, "d".to_string())
        ]
    );
    let resok4::READDIR(ok) = &res.resarray[1].resok else {
        panic!("expected READDIR result");
    };
    assert_eq!(ok.cookieverf, verf);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(4, verf, 8192)]).await;
    let (entries, eof) = readdir_names(&res);
    assert!(eof);
    assert_eq!(entries, vec![(5, "c".to_string()), (6, "d".to_string())]);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(6, verf, 8192)]).await;
    let (entries, eof) = readdir_names(&res);
    assert!(eof);
    assert!(entries.is_empty());
}

#[tokio::test]
async fn readdir_rejects_bad_cookies() {
    let store = Arc::new(MemStore::new());
    store.add_file("/a", b"");
    let state = server_state(store);
    let verf = GENERATION.to_be_bytes();

    for cookie in [1, 2, 100] {
        let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(cookie, verf, 8192)]).await;
        assert_eq!(res.status, nfsstat4::NFS4ERR_BAD_COOKIE, "cookie {}", cookie);
    }
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(3, [9; 8], 8192)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOT_SAME);

    let res =
        run(&state, vec![nfs_argop4::OP_PUTROOTFH, lookup("a"), readdir(0, [0; 8], 8192)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOTDIR);
}

#[tokio::test]
async fn readdir_respects_maxcount() {
    let store = Arc::new(MemStore::new());
    for name in ["a", "b", "c"] {
        store.add_file(&format!("/{name}"), b"");
    }
    let state = server_state(store);

    // Each entry with a one-letter name and no attributes takes 28 bytes.
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(0, [0; 8], 16 + 2 * 28)]).await;
    let (entries, eof) = readdir_names(&res);
    assert!(!eof);
    assert_eq!(entries, vec![(3, "a".to_string()), (4, "b".to_string())]);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, readdir(0, [0; 8], 20)]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_TOOSMALL);
}

#[tokio::test]
async fn open_write_read_close() {
    let store = Arc::new(MemStore::new());
    let state = server_state(store.clone());
    let clientid = establish_client(&state).await;

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(
                clientid,
                "new.txt",
                OPEN4_SHARE_ACCESS_BOTH,
                openflag4::OPEN4_CREATE(createhow4::UNCHECKED4(fattr4::default())),
            ),
            nfs_argop4::OP_GETFH,
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    let opened = open_result(&res);
    assert_eq!(opened.rflags & OPEN4_RESULT_CONFIRM, OPEN4_RESULT_CONFIRM);
    assert_eq!(opened.delegation_type, OPEN_DELEGATE_NONE);
    assert_eq!(opened.stateid.seqid, 1);
    let fh = file_handle(&res);
    assert!(store.exists("/new.txt"));

    let res = run(
        &state,
        vec![
            putfh(&fh),
            nfs_argop4::OP_OPEN_CONFIRM(OPEN_CONFIRM4args {
                open_stateid: opened.stateid,
                seqid: 2,
            }),
        ],
    )
    .await;
    let resok4::OPEN_CONFIRM(stateid) = res.resarray[1].resok.clone() else {
        panic!("expected OPEN_CONFIRM result, got {:?}", res.resarray[1]);
    };
    assert_eq!(stateid.seqid, 2);
    assert_eq!(stateid.other, opened.stateid.other);

    let res = run(
        &state,
        vec![
            putfh(&fh),
            nfs_argop4::OP_WRITE(WRITE4args {
                stateid,
                offset: 0,
                stable: stable_how4::FILE_SYNC4,
                data: b"hello".to_vec(),
            }),
            nfs_argop4::OP_READ(READ4args { stateid, offset: 0, count: 100 }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(
        res.resarray[1].resok,
        resok4::WRITE(WRITE4resok {
            count: 5,
            committed: stable_how4::FILE_SYNC4,
            writeverf: GENERATION.to_be_bytes(),
        })
    );
    assert_eq!(
        res.resarray[2].resok,
        resok4::READ(READ4resok { eof: true, data: b"hello".to_vec() })
    );

    // The stateid from OPEN was superseded by OPEN_CONFIRM.
    let res = run(
        &state,
        vec![
            putfh(&fh),
            nfs_argop4::OP_READ(READ4args { stateid: opened.stateid, offset: 0, count: 1 }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_OLD_STATEID);

    let res = run(
        &state,
        vec![putfh(&fh), nfs_argop4::OP_CLOSE(CLOSE4args { seqid: 3, open_stateid: stateid })],
    )
    .await;
    assert_eq!(res.resarray[1].resok, resok4::CLOSE(stateid4 { seqid: 3, other: stateid.other }));
    assert_eq!(store.open_count(), 0);
    assert!(state.opens.is_empty());

    let res = run(
        &state,
        vec![putfh(&fh), nfs_argop4::OP_READ(READ4args { stateid, offset: 0, count: 1 })],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_BAD_STATEID);
    assert_eq!(store.contents("/new.txt").expect("file"), b"hello");
}

#[tokio::test]
async fn open_needs_confirmed_client() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"x");
    let state = server_state(store);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(42, "f", OPEN4_SHARE_ACCESS_READ, openflag4::OPEN4_NOCREATE),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_STALE_CLIENTID);

    let res = run(&state, vec![nfs_argop4::OP_RENEW(RENEW4args { clientid: 42 })]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_STALE_CLIENTID);
}

#[tokio::test]
async fn open_checks_modes_and_types() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"x");
    store.add_dir("/d");
    let state = server_state(store);
    let clientid = establish_client(&state).await;

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(clientid, "d", OPEN4_SHARE_ACCESS_READ, openflag4::OPEN4_NOCREATE),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_ISDIR);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(clientid, "missing", OPEN4_SHARE_ACCESS_READ, openflag4::OPEN4_NOCREATE),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOENT);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(
                clientid,
                "f",
                OPEN4_SHARE_ACCESS_READ,
                openflag4::OPEN4_CREATE(createhow4::GUARDED4(fattr4::default())),
            ),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_EXIST);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(clientid, "f", OPEN4_SHARE_ACCESS_READ, openflag4::OPEN4_NOCREATE),
            nfs_argop4::OP_GETFH,
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    let read_only = open_result(&res).stateid;
    let fh = file_handle(&res);

    let res = run(
        &state,
        vec![
            putfh(&fh),
            nfs_argop4::OP_WRITE(WRITE4args {
                stateid: read_only,
                offset: 0,
                stable: stable_how4::UNSTABLE4,
                data: b"y".to_vec(),
            }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_OPENMODE);
}

#[tokio::test]
async fn exclusive_create_is_idempotent() {
    let store = Arc::new(MemStore::new());
    let state = server_state(store);
    let clientid = establish_client(&state).await;
    let exclusive = |verifier: verifier4| {
        open_args(
            clientid,
            "x",
            OPEN4_SHARE_ACCESS_WRITE,
            openflag4::OPEN4_CREATE(createhow4::EXCLUSIVE4(verifier)),
        )
    };

    let verifier = [0, 0, 0, 5, 0, 0, 0, 7];
    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, exclusive(verifier)]).await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    assert_eq!(
        open_result(&res).attrset,
        bitmap4::from_ids(&[attr::FATTR4_TIME_ACCESS_SET, attr::FATTR4_TIME_MODIFY_SET])
    );

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, exclusive(verifier)]).await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);

    let res = run(&state, vec![nfs_argop4::OP_PUTROOTFH, exclusive([9; 8])]).await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_EXIST);
}

#[tokio::test]
async fn anonymous_stateid_reads_without_open() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"0123456789");
    let state = server_state(store.clone());

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("f"),
            nfs_argop4::OP_READ(READ4args { stateid: stateid4::default(), offset: 2, count: 3 }),
        ],
    )
    .await;
    assert_eq!(res.resarray[2].resok, resok4::READ(READ4resok { eof: false, data: b"234".to_vec() }));
    assert_eq!(store.open_count(), 0);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            nfs_argop4::OP_READ(READ4args { stateid: stateid4::default(), offset: 0, count: 3 }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_ISDIR);
}

#[tokio::test]
async fn unstable_writes_are_synced_on_commit() {
    let store = Arc::new(MemStore::new());
    let state = server_state(store.clone());
    let clientid = establish_client(&state).await;

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            open_args(
                clientid,
                "log",
                OPEN4_SHARE_ACCESS_WRITE,
                openflag4::OPEN4_CREATE(createhow4::UNCHECKED4(fattr4::default())),
            ),
            nfs_argop4::OP_WRITE(WRITE4args {
                stateid: stateid4::default(),
                offset: 0,
                stable: stable_how4::UNSTABLE4,
                data: b"abc".to_vec(),
            }),
        ],
    )
    .await;
    // The anonymous stateid opens the file just for this write and syncs it.
    let resok4::WRITE(ok) = &res.resarray[2].resok else {
        panic!("expected WRITE result, got {:?}", res.resarray[2]);
    };
    assert_eq!(ok.committed, stable_how4::FILE_SYNC4);
    let stateid = open_result(&res).stateid;
    let syncs = store.sync_count();

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            lookup("log"),
            nfs_argop4::OP_WRITE(WRITE4args {
                stateid,
                offset: 3,
                stable: stable_how4::UNSTABLE4,
                data: b"def".to_vec(),
            }),
            nfs_argop4::OP_COMMIT(COMMIT4args { offset: 0, count: 0 }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
    let resok4::WRITE(ok) = &res.resarray[2].resok else {
        panic!("expected WRITE result");
    };
    assert_eq!(ok.committed, stable_how4::UNSTABLE4);
    assert_eq!(res.resarray[3].resok, resok4::COMMIT(GENERATION.to_be_bytes()));
    assert_eq!(store.sync_count(), syncs + 1);
    assert_eq!(store.contents("/log").expect("file"), b"abcdef");
}

#[tokio::test]
async fn secinfo_consumes_current_handle() {
    let store = Arc::new(MemStore::new());
    store.add_file("/f", b"");
    let state = server_state(store);

    let res = run(
        &state,
        vec![
            nfs_argop4::OP_PUTROOTFH,
            nfs_argop4::OP_SECINFO(SECINFO4args { name: "f".to_string() }),
            nfs_argop4::OP_GETFH,
        ],
    )
    .await;
    assert_eq!(res.resarray[1].resok, resok4::SECINFO(vec![1, 0]));
    assert_eq!(res.status, nfsstat4::NFS4ERR_NOFILEHANDLE);
}

#[tokio::test]
async fn setclientid_confirm_requires_matching_verifier() {
    let state = server_state(Arc::new(MemStore::new()));
    let res = run(
        &state,
        vec![nfs_argop4::OP_SETCLIENTID(SETCLIENTID4args {
            client: nfs_client_id4 { verifier: [3; 8], id: b"c".to_vec() },
            ..SETCLIENTID4args::default()
        })],
    )
    .await;
    let resok4::SETCLIENTID(ok) = &res.resarray[0].resok else {
        panic!("expected SETCLIENTID result");
    };
    let mut wrong = ok.setclientid_confirm;
    wrong[7] ^= 1;
    let res = run(
        &state,
        vec![nfs_argop4::OP_SETCLIENTID_CONFIRM(SETCLIENTID_CONFIRM4args {
            clientid: ok.clientid,
            setclientid_confirm: wrong,
        })],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4ERR_STALE_CLIENTID);

    let clientid = ok.clientid;
    let res = run(
        &state,
        vec![
            nfs_argop4::OP_SETCLIENTID_CONFIRM(SETCLIENTID_CONFIRM4args {
                clientid,
                setclientid_confirm: ok.setclientid_confirm,
            }),
            nfs_argop4::OP_RENEW(RENEW4args { clientid }),
        ],
    )
    .await;
    assert_eq!(res.status, nfsstat4::NFS4_OK);
}
