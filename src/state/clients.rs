//! Client identifiers established with SETCLIENTID / SETCLIENTID_CONFIRM.
//!
//! A client is known by the opaque id string it sends plus a boot verifier.
//! SETCLIENTID hands out a client id and a confirmation verifier; the id is
//! usable (OPEN, RENEW) once SETCLIENTID_CONFIRM echoes both back. A new boot
//! verifier for a known id string means the client restarted, so it gets a
//! fresh client id and the old one is dropped on confirmation.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::protocol::xdr::nfs4::{nfsstat4, verifier4};

#[derive(Clone, Debug)]
struct ClientRecord {
    id: Vec<u8>,
    verifier: verifier4,
    confirm: verifier4,
    confirmed: bool,
    last_renewed: Instant,
}

#[derive(Default)]
struct Clients {
    next: u32,
    records: HashMap<u64, ClientRecord>,
}

/// Every client id this server instance has handed out.
pub struct ClientTable {
    /// Low 32 bits of the server generation, the high half of each client id.
    generation: u32,
    /// How long a client may stay silent before its state is dropped.
    lease: Duration,
    /// Records keyed by client id.
    clients: Mutex<Clients>,
}

impl ClientTable {
    pub fn new(generation: u64, lease_time: u32) -> ClientTable {
        ClientTable {
            generation: generation as u32,
            lease: Duration::from_secs(lease_time.into()),
            clients: Mutex::new(Clients::default()),
        }
    }

    /// SETCLIENTID: returns the client id and the verifier the client must
    /// confirm it with.
    pub fn set_client_id(&self, id: &[u8], verifier: verifier4) -> (u64, verifier4) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.next = clients.next.wrapping_add(1);
        let confirm = {
            let mut confirm = [0_u8; 8];
            confirm[..4].copy_from_slice(&self.generation.to_be_bytes());
            confirm[4..].copy_from_slice(&clients.next.to_be_bytes());
            confirm
        };

        let existing = clients
            .records
            .iter()
            .find(|(_, r)| r.id == id && r.verifier == verifier)
            .map(|(clientid, _)| *clientid);
        let clientid = existing
            .unwrap_or_else(|| (u64::from(self.generation) << 32) | u64::from(clients.next));

        let record = clients.records.entry(clientid).or_insert_with(|| ClientRecord {
            id: id.to_vec(),
            verifier,
            confirm,
            confirmed: false,
            last_renewed: Instant::now(),
        });
        record.confirm = confirm;
        debug!("setclientid {:x} (existing: {})", clientid, existing.is_some());
        (clientid, confirm)
    }

    /// SETCLIENTID_CONFIRM.
    ///
    /// Returns the ids of earlier incarnations of the same client, which are
    /// dropped and whose open state must be released.
    pub fn confirm(&self, clientid: u64, confirm: verifier4) -> Result<Vec<u64>, nfsstat4> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let record = clients.records.get_mut(&clientid).ok_or(nfsstat4::NFS4ERR_STALE_CLIENTID)?;
        if record.confirm != confirm {
            return Err(nfsstat4::NFS4ERR_STALE_CLIENTID);
        }
        record.confirmed = true;
        record.last_renewed = Instant::now();
        let id = record.id.clone();
        let superseded: Vec<u64> = clients
            .records
            .iter()
            .filter(|(other, r)| **other != clientid && r.id == id)
            .map(|(other, _)| *other)
            .collect();
        clients.records.retain(|other, _| !superseded.contains(other));
        Ok(superseded)
    }

    /// RENEW, and the implicit renewal done by OPEN.
    ///
    /// Unknown or unconfirmed ids are `NFS4ERR_STALE_CLIENTID`; a lease left
    /// to run out is `NFS4ERR_EXPIRED` and the client must start over.
    pub fn renew(&self, clientid: u64) -> Result<(), nfsstat4> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let record = clients.records.get_mut(&clientid).ok_or(nfsstat4::NFS4ERR_STALE_CLIENTID)?;
        if !record.confirmed {
            return Err(nfsstat4::NFS4ERR_STALE_CLIENTID);
        }
        if record.last_renewed.elapsed() > self.lease {
            clients.records.remove(&clientid);
            return Err(nfsstat4::NFS4ERR_EXPIRED);
        }
        record.last_renewed = Instant::now();
        Ok(())
    }

    /// Drops every client whose lease ran out and returns their ids.
    pub fn expire(&self) -> Vec<u64> {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<u64> = clients
            .records
            .iter()
            .filter(|(_, r)| r.last_renewed.elapsed() > self.lease)
            .map(|(clientid, _)| *clientid)
            .collect();
        clients.records.retain(|clientid, _| !expired.contains(clientid));
        if !expired.is_empty() {
            debug!("expired {} client(s)", expired.len());
        }
        expired
    }

    /// Lease length; expired clients are reaped at this interval.
    pub fn lease(&self) -> Duration {
        self.lease
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
