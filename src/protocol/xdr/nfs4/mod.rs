//! XDR data types and constants for NFS version 4.0, as defined in RFC 7530
//! (protocol) and RFC 7531 (XDR description).
//!
//! This module holds the basic types shared by all operations. Per-operation
//! argument and result structures live in [`ops`], the attribute codec in
//! [`attr`].

// Names follow RFC 7530
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use smallvec::SmallVec;

use super::{deserialize, Deserialize, Serialize};
use crate::{DeserializeStruct, SerializeStruct, XdrEnum};

pub mod attr;
pub mod ops;

/// The RPC program number for NFS.
pub const PROGRAM: u32 = 100003;
/// The NFS protocol version served by this crate.
pub const VERSION: u32 = 4;
/// The only minor version accepted in COMPOUND.
pub const MINOR_VERSION: u32 = 0;

/// NFSv4 procedures. Everything except NULL goes through COMPOUND.
pub const NFSPROC4_NULL: u32 = 0;
pub const NFSPROC4_COMPOUND: u32 = 1;

/// Maximum size in bytes of a file handle.
pub const NFS4_FHSIZE: usize = 128;
/// Size of verifiers (write, cookie, client, create).
pub const NFS4_VERIFIER_SIZE: usize = 8;
/// Size of the server-chosen part of a stateid.
pub const NFS4_OTHER_SIZE: usize = 12;

/// Status of a single operation and of the whole COMPOUND.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat4 {
    #[default]
    NFS4_OK = 0,
    NFS4ERR_PERM = 1,
    NFS4ERR_NOENT = 2,
    NFS4ERR_IO = 5,
    NFS4ERR_NXIO = 6,
    NFS4ERR_ACCESS = 13,
    NFS4ERR_EXIST = 17,
    NFS4ERR_XDEV = 18,
    NFS4ERR_NOTDIR = 20,
    NFS4ERR_ISDIR = 21,
    NFS4ERR_INVAL = 22,
    NFS4ERR_FBIG = 27,
    NFS4ERR_NOSPC = 28,
    NFS4ERR_ROFS = 30,
    NFS4ERR_MLINK = 31,
    NFS4ERR_NAMETOOLONG = 63,
    NFS4ERR_NOTEMPTY = 66,
    NFS4ERR_DQUOT = 69,
    /// The handle does not (or no longer) name a live object.
    NFS4ERR_STALE = 70,
    /// The handle failed internal consistency checks.
    NFS4ERR_BADHANDLE = 10001,
    NFS4ERR_BAD_COOKIE = 10003,
    NFS4ERR_NOTSUPP = 10004,
    NFS4ERR_TOOSMALL = 10005,
    NFS4ERR_SERVERFAULT = 10006,
    NFS4ERR_BADTYPE = 10007,
    NFS4ERR_DELAY = 10008,
    NFS4ERR_SAME = 10009,
    NFS4ERR_DENIED = 10010,
    NFS4ERR_EXPIRED = 10011,
    NFS4ERR_LOCKED = 10012,
    NFS4ERR_GRACE = 10013,
    NFS4ERR_FHEXPIRED = 10014,
    NFS4ERR_SHARE_DENIED = 10015,
    NFS4ERR_WRONGSEC = 10016,
    NFS4ERR_CLID_INUSE = 10017,
    NFS4ERR_RESOURCE = 10018,
    NFS4ERR_MOVED = 10019,
    /// The operation needs a current file handle and none is set.
    NFS4ERR_NOFILEHANDLE = 10020,
    NFS4ERR_MINOR_VERS_MISMATCH = 10021,
    NFS4ERR_STALE_CLIENTID = 10022,
    NFS4ERR_STALE_STATEID = 10023,
    NFS4ERR_OLD_STATEID = 10024,
    NFS4ERR_BAD_STATEID = 10025,
    NFS4ERR_BAD_SEQID = 10026,
    NFS4ERR_NOT_SAME = 10027,
    NFS4ERR_LOCK_RANGE = 10028,
    NFS4ERR_SYMLINK = 10029,
    /// RESTOREFH with no saved file handle.
    NFS4ERR_RESTOREFH = 10030,
    NFS4ERR_LEASE_MOVED = 10031,
    NFS4ERR_ATTRNOTSUPP = 10032,
    NFS4ERR_NO_GRACE = 10033,
    NFS4ERR_RECLAIM_BAD = 10034,
    NFS4ERR_RECLAIM_CONFLICT = 10035,
    NFS4ERR_BADXDR = 10036,
    NFS4ERR_LOCKS_HELD = 10037,
    NFS4ERR_OPENMODE = 10038,
    NFS4ERR_BADOWNER = 10039,
    NFS4ERR_BADCHAR = 10040,
    NFS4ERR_BADNAME = 10041,
    NFS4ERR_BAD_RANGE = 10042,
    NFS4ERR_LOCK_NOTSUPP = 10043,
    NFS4ERR_OP_ILLEGAL = 10044,
    NFS4ERR_DEADLOCK = 10045,
    NFS4ERR_FILE_OPEN = 10046,
    NFS4ERR_ADMIN_REVOKED = 10047,
    NFS4ERR_CB_PATH_DOWN = 10048,
}
XdrEnum!(nfsstat4);

/// Operation numbers of NFSv4.0 (RFC 7530 section 16).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfs_opnum4 {
    OP_ACCESS = 3,
    OP_CLOSE = 4,
    OP_COMMIT = 5,
    OP_CREATE = 6,
    OP_DELEGPURGE = 7,
    OP_DELEGRETURN = 8,
    OP_GETATTR = 9,
    OP_GETFH = 10,
    OP_LINK = 11,
    OP_LOCK = 12,
    OP_LOCKT = 13,
    OP_LOCKU = 14,
    OP_LOOKUP = 15,
    OP_LOOKUPP = 16,
    OP_NVERIFY = 17,
    OP_OPEN = 18,
    OP_OPENATTR = 19,
    OP_OPEN_CONFIRM = 20,
    OP_OPEN_DOWNGRADE = 21,
    OP_PUTFH = 22,
    OP_PUTPUBFH = 23,
    OP_PUTROOTFH = 24,
    OP_READ = 25,
    OP_READDIR = 26,
    OP_READLINK = 27,
    OP_REMOVE = 28,
    OP_RENAME = 29,
    OP_RENEW = 30,
    OP_RESTOREFH = 31,
    OP_SAVEFH = 32,
    OP_SECINFO = 33,
    OP_SETATTR = 34,
    OP_SETCLIENTID = 35,
    OP_SETCLIENTID_CONFIRM = 36,
    OP_VERIFY = 37,
    OP_WRITE = 38,
    OP_RELEASE_LOCKOWNER = 39,
    OP_ILLEGAL = 10044,
}
XdrEnum!(nfs_opnum4);

/// Object types.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfs_ftype4 {
    #[default]
    NF4REG = 1,
    NF4DIR = 2,
    NF4BLK = 3,
    NF4CHR = 4,
    NF4LNK = 5,
    NF4SOCK = 6,
    NF4FIFO = 7,
    NF4ATTRDIR = 8,
    NF4NAMEDATTR = 9,
}
XdrEnum!(nfs_ftype4);

/// Opaque file handle, at most [`NFS4_FHSIZE`] bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct nfs_fh4(pub Vec<u8>);

impl nfs_fh4 {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for nfs_fh4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fh(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl Serialize for nfs_fh4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfs_fh4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = super::read_len(src)?;
        if length > NFS4_FHSIZE {
            return Err(super::invalid_data(&format!("nfs_fh4 of {length} bytes")));
        }
        let mut bytes = vec![0; length];
        src.read_exact(&mut bytes)?;
        super::utils::read_padding(length, src)?;
        self.0 = bytes;
        Ok(())
    }
}

/// Seconds and nanoseconds since the epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime4 {
    pub seconds: i64,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime4, seconds, nseconds);
SerializeStruct!(nfstime4, seconds, nseconds);

impl nfstime4 {
    pub fn now() -> nfstime4 {
        nfstime4::from(std::time::SystemTime::now())
    }
}

impl From<std::time::SystemTime> for nfstime4 {
    fn from(time: std::time::SystemTime) -> nfstime4 {
        match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => nfstime4 { seconds: d.as_secs() as i64, nseconds: d.subsec_nanos() },
            Err(e) => {
                let d = e.duration();
                if d.subsec_nanos() == 0 {
                    nfstime4 { seconds: -(d.as_secs() as i64), nseconds: 0 }
                } else {
                    nfstime4 {
                        seconds: -(d.as_secs() as i64) - 1,
                        nseconds: 1_000_000_000 - d.subsec_nanos(),
                    }
                }
            }
        }
    }
}

/// Value of the `*_SET` time attributes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum settime4 {
    #[default]
    SET_TO_SERVER_TIME4,
    SET_TO_CLIENT_TIME4(nfstime4),
}

impl Serialize for settime4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            settime4::SET_TO_SERVER_TIME4 => 0_u32.serialize(dest),
            settime4::SET_TO_CLIENT_TIME4(t) => {
                1_u32.serialize(dest)?;
                t.serialize(dest)
            }
        }
    }
}

impl Deserialize for settime4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => settime4::SET_TO_SERVER_TIME4,
            1 => settime4::SET_TO_CLIENT_TIME4(deserialize(src)?),
            how => return Err(super::invalid_data(&format!("Invalid time_how4 {how}"))),
        };
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fsid4 {
    pub major: u64,
    pub minor: u64,
}
DeserializeStruct!(fsid4, major, minor);
SerializeStruct!(fsid4, major, minor);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata4 {
    pub specdata1: u32,
    pub specdata2: u32,
}
DeserializeStruct!(specdata4, specdata1, specdata2);
SerializeStruct!(specdata4, specdata1, specdata2);

pub type verifier4 = [u8; NFS4_VERIFIER_SIZE];

/// Names an open file (or lock) on the server.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct stateid4 {
    pub seqid: u32,
    pub other: [u8; NFS4_OTHER_SIZE],
}
DeserializeStruct!(stateid4, seqid, other);
SerializeStruct!(stateid4, seqid, other);

impl stateid4 {
    /// The all-zeros stateid, usable for READ/WRITE without an OPEN.
    pub fn is_anonymous(&self) -> bool {
        self.seqid == 0 && self.other == [0; NFS4_OTHER_SIZE]
    }

    /// The all-ones stateid, which bypasses share reservations on READ.
    pub fn is_bypass(&self) -> bool {
        self.seqid == u32::MAX && self.other == [0xff; NFS4_OTHER_SIZE]
    }

    pub fn is_special(&self) -> bool {
        self.is_anonymous() || self.is_bypass()
    }
}

/// Directory change counters around a mutating operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct change_info4 {
    pub atomic: bool,
    pub before: u64,
    pub after: u64,
}
DeserializeStruct!(change_info4, atomic, before, after);
SerializeStruct!(change_info4, atomic, before, after);

/// Set of attribute identifiers. Bit `n` of word `n / 32` stands for attribute `n`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct bitmap4(pub SmallVec<[u32; 3]>);

impl bitmap4 {
    pub fn new() -> bitmap4 {
        bitmap4::default()
    }

    pub fn from_ids(ids: &[u32]) -> bitmap4 {
        let mut map = bitmap4::new();
        for id in ids {
            map.set(*id);
        }
        map
    }

    pub fn set(&mut self, id: u32) {
        let word = (id / 32) as usize;
        if self.0.len() <= word {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1 << (id % 32);
    }

    pub fn is_set(&self, id: u32) -> bool {
        self.0
            .get((id / 32) as usize)
            .is_some_and(|word| word & (1 << (id % 32)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// Identifiers present, in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().enumerate().flat_map(|(index, word)| {
            (0..32).filter(move |bit| word & (1 << bit) != 0).map(move |bit| index as u32 * 32 + bit)
        })
    }

    pub fn intersection(&self, other: &bitmap4) -> bitmap4 {
        let mut words: SmallVec<[u32; 3]> =
            self.0.iter().zip(other.0.iter()).map(|(a, b)| a & b).collect();
        while words.last() == Some(&0) {
            words.pop();
        }
        bitmap4(words)
    }
}

impl fmt::Debug for bitmap4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

impl Serialize for bitmap4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        super::write_len(self.0.len(), dest)?;
        for word in &self.0 {
            word.serialize(dest)?;
        }
        Ok(())
    }
}

impl Deserialize for bitmap4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = super::read_len(src)?;
        // No defined attribute lives beyond the third word; anything longer is garbage.
        if length > 8 {
            return Err(super::invalid_data("bitmap4 too long"));
        }
        self.0.clear();
        for _ in 0..length {
            self.0.push(deserialize::<u32>(src)?);
        }
        Ok(())
    }
}

/// Attribute bitmap followed by the packed attribute values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr4 {
    pub attrmask: bitmap4,
    pub attr_vals: Vec<u8>,
}
DeserializeStruct!(fattr4, attrmask, attr_vals);
SerializeStruct!(fattr4, attrmask, attr_vals);
