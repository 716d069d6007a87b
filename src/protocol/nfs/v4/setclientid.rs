//! SETCLIENTID and SETCLIENTID_CONFIRM (RFC 7530 sections 16.33 and 16.34).
//!
//! The callback address is accepted and ignored: delegations are never
//! granted, so the server never calls back.

use async_trait::async_trait;
use tracing::debug;

use super::{mismatched_args, respond, OperationHandler};
use crate::protocol::xdr::nfs4::nfs_opnum4;
use crate::protocol::xdr::nfs4::ops::{nfs_argop4, nfs_resop4, resok4, SETCLIENTID4resok};
use crate::state::{CompoundSession, ServerState};

pub struct SetClientId;

#[async_trait]
impl OperationHandler for SetClientId {
    async fn handle(
        &self,
        state: &ServerState,
        session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_SETCLIENTID(args) = args else {
            return mismatched_args(nfs_opnum4::OP_SETCLIENTID);
        };
        let (clientid, setclientid_confirm) =
            state.clients.set_client_id(&args.client.id, args.client.verifier);
        debug!(
            "setclientid from {} (callback {}) -> {:x}",
            session.client_addr, args.callback.cb_location.r_addr, clientid
        );
        nfs_resop4::ok(
            nfs_opnum4::OP_SETCLIENTID,
            resok4::SETCLIENTID(SETCLIENTID4resok { clientid, setclientid_confirm }),
        )
    }
}

pub struct SetClientIdConfirm;

#[async_trait]
impl OperationHandler for SetClientIdConfirm {
    async fn handle(
        &self,
        state: &ServerState,
        _session: &mut CompoundSession,
        args: nfs_argop4,
    ) -> nfs_resop4 {
        let nfs_argop4::OP_SETCLIENTID_CONFIRM(args) = args else {
            return mismatched_args(nfs_opnum4::OP_SETCLIENTID_CONFIRM);
        };
        let result = state
            .confirm_client(args.clientid, args.setclientid_confirm)
            .await
            .map(|()| resok4::Void);
        debug!("setclientid_confirm {:x} -> {:?}", args.clientid, result);
        respond(nfs_opnum4::OP_SETCLIENTID_CONFIRM, result)
    }
}
