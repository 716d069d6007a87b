//! COMPOUND arguments and results, one structure per operation
//! (RFC 7531 sections on `nfs_argop4` / `nfs_resop4`).
//!
//! Arguments are decoded one operation at a time by [`nfs_argop4::decode`] so
//! that the COMPOUND executor can stop at the first failing operation without
//! touching the rest of the request.

// Names follow RFC 7530
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    bitmap4, change_info4, fattr4, nfs_fh4, nfs_ftype4, nfs_opnum4, nfsstat4, specdata4,
    stateid4, verifier4,
};
use crate::xdr::{deserialize, invalid_data, Deserialize, Serialize};
use crate::{DeserializeStruct, SerializeStruct, XdrEnum};

/// A path component, UTF-8 on the wire.
pub type component4 = String;

pub const ACCESS4_READ: u32 = 0x0000_0001;
pub const ACCESS4_LOOKUP: u32 = 0x0000_0002;
pub const ACCESS4_MODIFY: u32 = 0x0000_0004;
pub const ACCESS4_EXTEND: u32 = 0x0000_0008;
pub const ACCESS4_DELETE: u32 = 0x0000_0010;
pub const ACCESS4_EXECUTE: u32 = 0x0000_0020;

pub const OPEN4_SHARE_ACCESS_READ: u32 = 0x0000_0001;
pub const OPEN4_SHARE_ACCESS_WRITE: u32 = 0x0000_0002;
pub const OPEN4_SHARE_ACCESS_BOTH: u32 = 0x0000_0003;

pub const OPEN4_RESULT_CONFIRM: u32 = 0x0000_0002;

/// Header of a COMPOUND call; the operations follow it on the wire.
#[derive(Clone, Debug, Default)]
pub struct COMPOUND4args_header {
    pub tag: String,
    pub minorversion: u32,
    pub numops: u32,
}
DeserializeStruct!(COMPOUND4args_header, tag, minorversion, numops);
SerializeStruct!(COMPOUND4args_header, tag, minorversion, numops);

#[derive(Clone, Debug, Default)]
pub struct COMPOUND4res {
    pub status: nfsstat4,
    pub tag: String,
    pub resarray: Vec<nfs_resop4>,
}
SerializeStruct!(COMPOUND4res, status, tag, resarray);

impl Serialize for Vec<nfs_resop4> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        crate::xdr::write_len(self.len(), dest)?;
        for res in self {
            res.serialize(dest)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ACCESS4args {
    pub access: u32,
}
DeserializeStruct!(ACCESS4args, access);
SerializeStruct!(ACCESS4args, access);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ACCESS4resok {
    pub supported: u32,
    pub access: u32,
}
DeserializeStruct!(ACCESS4resok, supported, access);
SerializeStruct!(ACCESS4resok, supported, access);

#[derive(Clone, Debug, Default)]
pub struct CLOSE4args {
    pub seqid: u32,
    pub open_stateid: stateid4,
}
DeserializeStruct!(CLOSE4args, seqid, open_stateid);
SerializeStruct!(CLOSE4args, seqid, open_stateid);

#[derive(Clone, Debug, Default)]
pub struct COMMIT4args {
    pub offset: u64,
    pub count: u32,
}
DeserializeStruct!(COMMIT4args, offset, count);
SerializeStruct!(COMMIT4args, offset, count);

/// Object type and type-specific data for CREATE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum createtype4 {
    NF4LNK(String),
    NF4BLK(specdata4),
    NF4CHR(specdata4),
    Other(nfs_ftype4),
}

impl Default for createtype4 {
    fn default() -> createtype4 {
        createtype4::Other(nfs_ftype4::NF4DIR)
    }
}

impl createtype4 {
    pub fn ftype(&self) -> nfs_ftype4 {
        match self {
            createtype4::NF4LNK(_) => nfs_ftype4::NF4LNK,
            createtype4::NF4BLK(_) => nfs_ftype4::NF4BLK,
            createtype4::NF4CHR(_) => nfs_ftype4::NF4CHR,
            createtype4::Other(t) => *t,
        }
    }
}

impl Serialize for createtype4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.ftype().serialize(dest)?;
        match self {
            createtype4::NF4LNK(linkdata) => linkdata.serialize(dest),
            createtype4::NF4BLK(dev) | createtype4::NF4CHR(dev) => dev.serialize(dest),
            createtype4::Other(_) => Ok(()),
        }
    }
}

impl Deserialize for createtype4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<nfs_ftype4>(src)? {
            nfs_ftype4::NF4LNK => createtype4::NF4LNK(deserialize(src)?),
            nfs_ftype4::NF4BLK => createtype4::NF4BLK(deserialize(src)?),
            nfs_ftype4::NF4CHR => createtype4::NF4CHR(deserialize(src)?),
            other => createtype4::Other(other),
        };
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CREATE4args {
    pub objtype: createtype4,
    pub objname: component4,
    pub createattrs: fattr4,
}
DeserializeStruct!(CREATE4args, objtype, objname, createattrs);
SerializeStruct!(CREATE4args, objtype, objname, createattrs);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CREATE4resok {
    pub cinfo: change_info4,
    pub attrset: bitmap4,
}
DeserializeStruct!(CREATE4resok, cinfo, attrset);
SerializeStruct!(CREATE4resok, cinfo, attrset);

#[derive(Clone, Debug, Default)]
pub struct GETATTR4args {
    pub attr_request: bitmap4,
}
DeserializeStruct!(GETATTR4args, attr_request);
SerializeStruct!(GETATTR4args, attr_request);

#[derive(Clone, Debug, Default)]
pub struct LOOKUP4args {
    pub objname: component4,
}
DeserializeStruct!(LOOKUP4args, objname);
SerializeStruct!(LOOKUP4args, objname);

#[derive(Clone, Debug, Default)]
pub struct open_owner4 {
    pub clientid: u64,
    pub owner: Vec<u8>,
}
DeserializeStruct!(open_owner4, clientid, owner);
SerializeStruct!(open_owner4, clientid, owner);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode4 {
    #[default]
    UNCHECKED4 = 0,
    GUARDED4 = 1,
    EXCLUSIVE4 = 2,
}
XdrEnum!(createmode4);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum createhow4 {
    UNCHECKED4(fattr4),
    GUARDED4(fattr4),
    EXCLUSIVE4(verifier4),
}

impl Default for createhow4 {
    fn default() -> createhow4 {
        createhow4::UNCHECKED4(fattr4::default())
    }
}

impl Serialize for createhow4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createhow4::UNCHECKED4(attrs) => {
                createmode4::UNCHECKED4.serialize(dest)?;
                attrs.serialize(dest)
            }
            createhow4::GUARDED4(attrs) => {
                createmode4::GUARDED4.serialize(dest)?;
                attrs.serialize(dest)
            }
            createhow4::EXCLUSIVE4(verf) => {
                createmode4::EXCLUSIVE4.serialize(dest)?;
                verf.serialize(dest)
            }
        }
    }
}

impl Deserialize for createhow4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<createmode4>(src)? {
            createmode4::UNCHECKED4 => createhow4::UNCHECKED4(deserialize(src)?),
            createmode4::GUARDED4 => createhow4::GUARDED4(deserialize(src)?),
            createmode4::EXCLUSIVE4 => createhow4::EXCLUSIVE4(deserialize(src)?),
        };
        Ok(())
    }
}

/// `openflag4`: whether OPEN may create the file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum openflag4 {
    #[default]
    OPEN4_NOCREATE,
    OPEN4_CREATE(createhow4),
}

impl Serialize for openflag4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            openflag4::OPEN4_NOCREATE => 0_u32.serialize(dest),
            openflag4::OPEN4_CREATE(how) => {
                1_u32.serialize(dest)?;
                how.serialize(dest)
            }
        }
    }
}

impl Deserialize for openflag4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => openflag4::OPEN4_NOCREATE,
            1 => openflag4::OPEN4_CREATE(deserialize(src)?),
            how => return Err(invalid_data(&format!("Invalid opentype4 {how}"))),
        };
        Ok(())
    }
}

/// How OPEN names the file. Only `CLAIM_NULL` is served; the other claims
/// are decoded so they can be refused with a proper status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum open_claim4 {
    CLAIM_NULL(component4),
    CLAIM_PREVIOUS(u32),
    CLAIM_DELEGATE_CUR(stateid4, component4),
    CLAIM_DELEGATE_PREV(component4),
}

impl Default for open_claim4 {
    fn default() -> open_claim4 {
        open_claim4::CLAIM_NULL(String::new())
    }
}

impl Serialize for open_claim4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            open_claim4::CLAIM_NULL(file) => {
                0_u32.serialize(dest)?;
                file.serialize(dest)
            }
            open_claim4::CLAIM_PREVIOUS(delegate_type) => {
                1_u32.serialize(dest)?;
                delegate_type.serialize(dest)
            }
            open_claim4::CLAIM_DELEGATE_CUR(stateid, file) => {
                2_u32.serialize(dest)?;
                stateid.serialize(dest)?;
                file.serialize(dest)
            }
            open_claim4::CLAIM_DELEGATE_PREV(file) => {
                3_u32.serialize(dest)?;
                file.serialize(dest)
            }
        }
    }
}

impl Deserialize for open_claim4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => open_claim4::CLAIM_NULL(deserialize(src)?),
            1 => open_claim4::CLAIM_PREVIOUS(deserialize(src)?),
            2 => open_claim4::CLAIM_DELEGATE_CUR(deserialize(src)?, deserialize(src)?),
            3 => open_claim4::CLAIM_DELEGATE_PREV(deserialize(src)?),
            claim => return Err(invalid_data(&format!("Invalid open_claim_type4 {claim}"))),
        };
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct OPEN4args {
    pub seqid: u32,
    pub share_access: u32,
    pub share_deny: u32,
    pub owner: open_owner4,
    pub openhow: openflag4,
    pub claim: open_claim4,
}
DeserializeStruct!(OPEN4args, seqid, share_access, share_deny, owner, openhow, claim);
SerializeStruct!(OPEN4args, seqid, share_access, share_deny, owner, openhow, claim);

/// Only `OPEN_DELEGATE_NONE` is ever granted, so the delegation is a bare
/// discriminant on the wire.
pub const OPEN_DELEGATE_NONE: u32 = 0;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OPEN4resok {
    pub stateid: stateid4,
    pub cinfo: change_info4,
    pub rflags: u32,
    pub attrset: bitmap4,
    pub delegation_type: u32,
}
DeserializeStruct!(OPEN4resok, stateid, cinfo, rflags, attrset, delegation_type);
SerializeStruct!(OPEN4resok, stateid, cinfo, rflags, attrset, delegation_type);

#[derive(Clone, Debug, Default)]
pub struct OPEN_CONFIRM4args {
    pub open_stateid: stateid4,
    pub seqid: u32,
}
DeserializeStruct!(OPEN_CONFIRM4args, open_stateid, seqid);
SerializeStruct!(OPEN_CONFIRM4args, open_stateid, seqid);

#[derive(Clone, Debug, Default)]
pub struct PUTFH4args {
    pub object: nfs_fh4,
}
DeserializeStruct!(PUTFH4args, object);
SerializeStruct!(PUTFH4args, object);

#[derive(Clone, Debug, Default)]
pub struct READ4args {
    pub stateid: stateid4,
    pub offset: u64,
    pub count: u32,
}
DeserializeStruct!(READ4args, stateid, offset, count);
SerializeStruct!(READ4args, stateid, offset, count);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READ4resok {
    pub eof: bool,
    pub data: Vec<u8>,
}
DeserializeStruct!(READ4resok, eof, data);
SerializeStruct!(READ4resok, eof, data);

#[derive(Clone, Debug, Default)]
pub struct READDIR4args {
    pub cookie: u64,
    pub cookieverf: verifier4,
    pub dircount: u32,
    pub maxcount: u32,
    pub attr_request: bitmap4,
}
DeserializeStruct!(READDIR4args, cookie, cookieverf, dircount, maxcount, attr_request);
SerializeStruct!(READDIR4args, cookie, cookieverf, dircount, maxcount, attr_request);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct entry4 {
    pub cookie: u64,
    pub name: component4,
    pub attrs: fattr4,
}
DeserializeStruct!(entry4, cookie, name, attrs);
SerializeStruct!(entry4, cookie, name, attrs);

/// Directory listing. The XDR form is a linked list of `entry4 *`, written
/// here as a flat sequence of "value follows" markers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct dirlist4 {
    pub entries: Vec<entry4>,
    pub eof: bool,
}

impl Serialize for dirlist4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for entry in &self.entries {
            true.serialize(dest)?;
            entry.serialize(dest)?;
        }
        false.serialize(dest)?;
        self.eof.serialize(dest)
    }
}

impl Deserialize for dirlist4 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.entries.clear();
        while deserialize::<bool>(src)? {
            self.entries.push(deserialize(src)?);
        }
        self.eof = deserialize(src)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct READDIR4resok {
    pub cookieverf: verifier4,
    pub reply: dirlist4,
}
DeserializeStruct!(READDIR4resok, cookieverf, reply);
SerializeStruct!(READDIR4resok, cookieverf, reply);

#[derive(Clone, Debug, Default)]
pub struct REMOVE4args {
    pub target: component4,
}
DeserializeStruct!(REMOVE4args, target);
SerializeStruct!(REMOVE4args, target);

#[derive(Clone, Debug, Default)]
pub struct RENAME4args {
    pub oldname: component4,
    pub newname: component4,
}
DeserializeStruct!(RENAME4args, oldname, newname);
SerializeStruct!(RENAME4args, oldname, newname);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RENAME4resok {
    pub source_cinfo: change_info4,
    pub target_cinfo: change_info4,
}
DeserializeStruct!(RENAME4resok, source_cinfo, target_cinfo);
SerializeStruct!(RENAME4resok, source_cinfo, target_cinfo);

#[derive(Clone, Debug, Default)]
pub struct RENEW4args {
    pub clientid: u64,
}
DeserializeStruct!(RENEW4args, clientid);
SerializeStruct!(RENEW4args, clientid);

#[derive(Clone, Debug, Default)]
pub struct SECINFO4args {
    pub name: component4,
}
DeserializeStruct!(SECINFO4args, name);
SerializeStruct!(SECINFO4args, name);

#[derive(Clone, Debug, Default)]
pub struct SETATTR4args {
    pub stateid: stateid4,
    pub obj_attributes: fattr4,
}
DeserializeStruct!(SETATTR4args, stateid, obj_attributes);
SerializeStruct!(SETATTR4args, stateid, obj_attributes);

#[derive(Clone, Debug, Default)]
pub struct nfs_client_id4 {
    pub verifier: verifier4,
    pub id: Vec<u8>,
}
DeserializeStruct!(nfs_client_id4, verifier, id);
SerializeStruct!(nfs_client_id4, verifier, id);

#[derive(Clone, Debug, Default)]
pub struct netaddr4 {
    pub r_netid: String,
    pub r_addr: String,
}
DeserializeStruct!(netaddr4, r_netid, r_addr);
SerializeStruct!(netaddr4, r_netid, r_addr);

#[derive(Clone, Debug, Default)]
pub struct cb_client4 {
    pub cb_program: u32,
    pub cb_location: netaddr4,
}
DeserializeStruct!(cb_client4, cb_program, cb_location);
SerializeStruct!(cb_client4, cb_program, cb_location);

#[derive(Clone, Debug, Default)]
pub struct SETCLIENTID4args {
    pub client: nfs_client_id4,
    pub callback: cb_client4,
    pub callback_ident: u32,
}
DeserializeStruct!(SETCLIENTID4args, client, callback, callback_ident);
SerializeStruct!(SETCLIENTID4args, client, callback, callback_ident);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SETCLIENTID4resok {
    pub clientid: u64,
    pub setclientid_confirm: verifier4,
}
DeserializeStruct!(SETCLIENTID4resok, clientid, setclientid_confirm);
SerializeStruct!(SETCLIENTID4resok, clientid, setclientid_confirm);

#[derive(Clone, Debug, Default)]
pub struct SETCLIENTID_CONFIRM4args {
    pub clientid: u64,
    pub setclientid_confirm: verifier4,
}
DeserializeStruct!(SETCLIENTID_CONFIRM4args, clientid, setclientid_confirm);
SerializeStruct!(SETCLIENTID_CONFIRM4args, clientid, setclientid_confirm);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how4 {
    #[default]
    UNSTABLE4 = 0,
    DATA_SYNC4 = 1,
    FILE_SYNC4 = 2,
}
XdrEnum!(stable_how4);

#[derive(Clone, Debug, Default)]
pub struct WRITE4args {
    pub stateid: stateid4,
    pub offset: u64,
    pub stable: stable_how4,
    pub data: Vec<u8>,
}
DeserializeStruct!(WRITE4args, stateid, offset, stable, data);
SerializeStruct!(WRITE4args, stateid, offset, stable, data);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WRITE4resok {
    pub count: u32,
    pub committed: stable_how4,
    pub writeverf: verifier4,
}
DeserializeStruct!(WRITE4resok, count, committed, writeverf);
SerializeStruct!(WRITE4resok, count, committed, writeverf);

/// Decoded arguments of one COMPOUND operation.
#[derive(Clone, Debug)]
pub enum nfs_argop4 {
    OP_ACCESS(ACCESS4args),
    OP_CLOSE(CLOSE4args),
    OP_COMMIT(COMMIT4args),
    OP_CREATE(CREATE4args),
    OP_GETATTR(GETATTR4args),
    OP_GETFH,
    OP_LOOKUP(LOOKUP4args),
    OP_LOOKUPP,
    OP_OPEN(OPEN4args),
    OP_OPEN_CONFIRM(OPEN_CONFIRM4args),
    OP_PUTFH(PUTFH4args),
    OP_PUTPUBFH,
    OP_PUTROOTFH,
    OP_READ(READ4args),
    OP_READDIR(READDIR4args),
    OP_REMOVE(REMOVE4args),
    OP_RENAME(RENAME4args),
    OP_RENEW(RENEW4args),
    OP_RESTOREFH,
    OP_SAVEFH,
    OP_SECINFO(SECINFO4args),
    OP_SETATTR(SETATTR4args),
    OP_SETCLIENTID(SETCLIENTID4args),
    OP_SETCLIENTID_CONFIRM(SETCLIENTID_CONFIRM4args),
    OP_WRITE(WRITE4args),
}

impl nfs_argop4 {
    /// Reads the arguments of operation `op` from `src`.
    ///
    /// Returns `Ok(None)` for NFSv4.0 operations whose arguments this server
    /// does not model; the caller has no handler for those anyway.
    pub fn decode<R: Read>(op: nfs_opnum4, src: &mut R) -> std::io::Result<Option<nfs_argop4>> {
        use nfs_opnum4::*;
        let args = match op {
            OP_ACCESS => nfs_argop4::OP_ACCESS(deserialize(src)?),
            OP_CLOSE => nfs_argop4::OP_CLOSE(deserialize(src)?),
            OP_COMMIT => nfs_argop4::OP_COMMIT(deserialize(src)?),
            OP_CREATE => nfs_argop4::OP_CREATE(deserialize(src)?),
            OP_GETATTR => nfs_argop4::OP_GETATTR(deserialize(src)?),
            OP_GETFH => nfs_argop4::OP_GETFH,
            OP_LOOKUP => nfs_argop4::OP_LOOKUP(deserialize(src)?),
            OP_LOOKUPP => nfs_argop4::OP_LOOKUPP,
            OP_OPEN => nfs_argop4::OP_OPEN(deserialize(src)?),
            OP_OPEN_CONFIRM => nfs_argop4::OP_OPEN_CONFIRM(deserialize(src)?),
            OP_PUTFH => nfs_argop4::OP_PUTFH(deserialize(src)?),
            OP_PUTPUBFH => nfs_argop4::OP_PUTPUBFH,
            OP_PUTROOTFH => nfs_argop4::OP_PUTROOTFH,
            OP_READ => nfs_argop4::OP_READ(deserialize(src)?),
            OP_READDIR => nfs_argop4::OP_READDIR(deserialize(src)?),
            OP_REMOVE => nfs_argop4::OP_REMOVE(deserialize(src)?),
            OP_RENAME => nfs_argop4::OP_RENAME(deserialize(src)?),
            OP_RENEW => nfs_argop4::OP_RENEW(deserialize(src)?),
            OP_RESTOREFH => nfs_argop4::OP_RESTOREFH,
            OP_SAVEFH => nfs_argop4::OP_SAVEFH,
            OP_SECINFO => nfs_argop4::OP_SECINFO(deserialize(src)?),
            OP_SETATTR => nfs_argop4::OP_SETATTR(deserialize(src)?),
            OP_SETCLIENTID => nfs_argop4::OP_SETCLIENTID(deserialize(src)?),
            OP_SETCLIENTID_CONFIRM => nfs_argop4::OP_SETCLIENTID_CONFIRM(deserialize(src)?),
            OP_WRITE => nfs_argop4::OP_WRITE(deserialize(src)?),
            _ => return Ok(None),
        };
        Ok(Some(args))
    }

    pub fn opnum(&self) -> nfs_opnum4 {
        match self {
            nfs_argop4::OP_ACCESS(_) => nfs_opnum4::OP_ACCESS,
            nfs_argop4::OP_CLOSE(_) => nfs_opnum4::OP_CLOSE,
            nfs_argop4::OP_COMMIT(_) => nfs_opnum4::OP_COMMIT,
            nfs_argop4::OP_CREATE(_) => nfs_opnum4::OP_CREATE,
            nfs_argop4::OP_GETATTR(_) => nfs_opnum4::OP_GETATTR,
            nfs_argop4::OP_GETFH => nfs_opnum4::OP_GETFH,
            nfs_argop4::OP_LOOKUP(_) => nfs_opnum4::OP_LOOKUP,
            nfs_argop4::OP_LOOKUPP => nfs_opnum4::OP_LOOKUPP,
            nfs_argop4::OP_OPEN(_) => nfs_opnum4::OP_OPEN,
            nfs_argop4::OP_OPEN_CONFIRM(_) => nfs_opnum4::OP_OPEN_CONFIRM,
            nfs_argop4::OP_PUTFH(_) => nfs_opnum4::OP_PUTFH,
            nfs_argop4::OP_PUTPUBFH => nfs_opnum4::OP_PUTPUBFH,
            nfs_argop4::OP_PUTROOTFH => nfs_opnum4::OP_PUTROOTFH,
            nfs_argop4::OP_READ(_) => nfs_opnum4::OP_READ,
            nfs_argop4::OP_READDIR(_) => nfs_opnum4::OP_READDIR,
            nfs_argop4::OP_REMOVE(_) => nfs_opnum4::OP_REMOVE,
            nfs_argop4::OP_RENAME(_) => nfs_opnum4::OP_RENAME,
            nfs_argop4::OP_RENEW(_) => nfs_opnum4::OP_RENEW,
            nfs_argop4::OP_RESTOREFH => nfs_opnum4::OP_RESTOREFH,
            nfs_argop4::OP_SAVEFH => nfs_opnum4::OP_SAVEFH,
            nfs_argop4::OP_SECINFO(_) => nfs_opnum4::OP_SECINFO,
            nfs_argop4::OP_SETATTR(_) => nfs_opnum4::OP_SETATTR,
            nfs_argop4::OP_SETCLIENTID(_) => nfs_opnum4::OP_SETCLIENTID,
            nfs_argop4::OP_SETCLIENTID_CONFIRM(_) => nfs_opnum4::OP_SETCLIENTID_CONFIRM,
            nfs_argop4::OP_WRITE(_) => nfs_opnum4::OP_WRITE,
        }
    }
}

impl Serialize for nfs_argop4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.opnum().serialize(dest)?;
        match self {
            nfs_argop4::OP_ACCESS(a) => a.serialize(dest),
            nfs_argop4::OP_CLOSE(a) => a.serialize(dest),
            nfs_argop4::OP_COMMIT(a) => a.serialize(dest),
            nfs_argop4::OP_CREATE(a) => a.serialize(dest),
            nfs_argop4::OP_GETATTR(a) => a.serialize(dest),
            nfs_argop4::OP_LOOKUP(a) => a.serialize(dest),
            nfs_argop4::OP_OPEN(a) => a.serialize(dest),
            nfs_argop4::OP_OPEN_CONFIRM(a) => a.serialize(dest),
            nfs_argop4::OP_PUTFH(a) => a.serialize(dest),
            nfs_argop4::OP_READ(a) => a.serialize(dest),
            nfs_argop4::OP_READDIR(a) => a.serialize(dest),
            nfs_argop4::OP_REMOVE(a) => a.serialize(dest),
            nfs_argop4::OP_RENAME(a) => a.serialize(dest),
            nfs_argop4::OP_RENEW(a) => a.serialize(dest),
            nfs_argop4::OP_SECINFO(a) => a.serialize(dest),
            nfs_argop4::OP_SETATTR(a) => a.serialize(dest),
            nfs_argop4::OP_SETCLIENTID(a) => a.serialize(dest),
            nfs_argop4::OP_SETCLIENTID_CONFIRM(a) => a.serialize(dest),
            nfs_argop4::OP_WRITE(a) => a.serialize(dest),
            nfs_argop4::OP_GETFH
            | nfs_argop4::OP_LOOKUPP
            | nfs_argop4::OP_PUTPUBFH
            | nfs_argop4::OP_PUTROOTFH
            | nfs_argop4::OP_RESTOREFH
            | nfs_argop4::OP_SAVEFH => Ok(()),
        }
    }
}

/// Payload of a successful operation result.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum resok4 {
    #[default]
    Void,
    ACCESS(ACCESS4resok),
    CLOSE(stateid4),
    COMMIT(verifier4),
    CREATE(CREATE4resok),
    GETATTR(fattr4),
    GETFH(nfs_fh4),
    OPEN(OPEN4resok),
    OPEN_CONFIRM(stateid4),
    READ(READ4resok),
    READDIR(READDIR4resok),
    REMOVE(change_info4),
    RENAME(RENAME4resok),
    SECINFO(Vec<u32>),
    /// SETATTR reports the attributes it applied whatever the status.
    SETATTR(bitmap4),
    SETCLIENTID(SETCLIENTID4resok),
    WRITE(WRITE4resok),
}

impl Serialize for resok4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            resok4::Void => Ok(()),
            resok4::ACCESS(r) => r.serialize(dest),
            resok4::CLOSE(r) | resok4::OPEN_CONFIRM(r) => r.serialize(dest),
            resok4::COMMIT(r) => r.serialize(dest),
            resok4::CREATE(r) => r.serialize(dest),
            resok4::GETATTR(r) => r.serialize(dest),
            resok4::GETFH(r) => r.serialize(dest),
            resok4::OPEN(r) => r.serialize(dest),
            resok4::READ(r) => r.serialize(dest),
            resok4::READDIR(r) => r.serialize(dest),
            resok4::REMOVE(r) => r.serialize(dest),
            resok4::RENAME(r) => r.serialize(dest),
            // secinfo4 for flavors other than RPCSEC_GSS is just the flavor number.
            resok4::SECINFO(r) => r.serialize(dest),
            resok4::SETATTR(r) => r.serialize(dest),
            resok4::SETCLIENTID(r) => r.serialize(dest),
            resok4::WRITE(r) => r.serialize(dest),
        }
    }
}

/// Result of one COMPOUND operation: opcode, status and, on success, the
/// operation's payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct nfs_resop4 {
    pub resop: nfs_opnum4,
    pub status: nfsstat4,
    pub resok: resok4,
}

impl nfs_resop4 {
    pub fn ok(resop: nfs_opnum4, resok: resok4) -> nfs_resop4 {
        nfs_resop4 { resop, status: nfsstat4::NFS4_OK, resok }
    }

    pub fn void(resop: nfs_opnum4) -> nfs_resop4 {
        nfs_resop4::ok(resop, resok4::Void)
    }

    pub fn error(resop: nfs_opnum4, status: nfsstat4) -> nfs_resop4 {
        let resok = match resop {
            nfs_opnum4::OP_SETATTR => resok4::SETATTR(bitmap4::new()),
            _ => resok4::Void,
        };
        nfs_resop4 { resop, status, resok }
    }

    /// Result for an opcode outside the NFSv4.0 operation set.
    pub fn illegal() -> nfs_resop4 {
        nfs_resop4::error(nfs_opnum4::OP_ILLEGAL, nfsstat4::NFS4ERR_OP_ILLEGAL)
    }
}

impl Serialize for nfs_resop4 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.resop.serialize(dest)?;
        self.status.serialize(dest)?;
        match (&self.status, &self.resok) {
            (nfsstat4::NFS4_OK, resok) => resok.serialize(dest),
            (_, resok4::SETATTR(attrsset)) => attrsset.serialize(dest),
            _ => Ok(()),
        }
    }
}
