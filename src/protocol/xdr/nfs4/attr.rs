//! File attribute codec (`fattr4`, RFC 7530 section 5).
//!
//! On the wire a set of attributes is a [`bitmap4`] naming the attributes
//! followed by an opaque blob holding their values packed in ascending
//! identifier order. Each [`Attribute`] variant knows its identifier and
//! encodes only its value; [`encode_attributes`] and [`decode_attributes`]
//! take care of the bitmap and the ordering.

use std::io::{Cursor, Read, Write};

use super::{bitmap4, fattr4, fsid4, nfs_fh4, nfs_ftype4, nfsstat4, nfstime4, settime4};
use crate::xdr::{deserialize, Serialize};

pub const FATTR4_SUPPORTED_ATTRS: u32 = 0;
pub const FATTR4_TYPE: u32 = 1;
pub const FATTR4_FH_EXPIRE_TYPE: u32 = 2;
pub const FATTR4_CHANGE: u32 = 3;
pub const FATTR4_SIZE: u32 = 4;
pub const FATTR4_LINK_SUPPORT: u32 = 5;
pub const FATTR4_SYMLINK_SUPPORT: u32 = 6;
pub const FATTR4_NAMED_ATTR: u32 = 7;
pub const FATTR4_FSID: u32 = 8;
pub const FATTR4_UNIQUE_HANDLES: u32 = 9;
pub const FATTR4_LEASE_TIME: u32 = 10;
pub const FATTR4_RDATTR_ERROR: u32 = 11;
pub const FATTR4_FILEHANDLE: u32 = 19;
pub const FATTR4_FILEID: u32 = 20;
pub const FATTR4_MAXFILESIZE: u32 = 27;
pub const FATTR4_MAXNAME: u32 = 29;
pub const FATTR4_MAXREAD: u32 = 30;
pub const FATTR4_MAXWRITE: u32 = 31;
pub const FATTR4_MODE: u32 = 33;
pub const FATTR4_NUMLINKS: u32 = 35;
pub const FATTR4_OWNER: u32 = 36;
pub const FATTR4_OWNER_GROUP: u32 = 37;
pub const FATTR4_SPACE_USED: u32 = 45;
pub const FATTR4_TIME_ACCESS: u32 = 47;
pub const FATTR4_TIME_ACCESS_SET: u32 = 48;
pub const FATTR4_TIME_METADATA: u32 = 52;
pub const FATTR4_TIME_MODIFY: u32 = 53;
pub const FATTR4_TIME_MODIFY_SET: u32 = 54;
pub const FATTR4_MOUNTED_ON_FILEID: u32 = 55;

/// `fh_expire_type` value: handles never expire while the object lives.
pub const FH4_PERSISTENT: u32 = 0;

/// Every attribute this server understands, in ascending order.
pub const SUPPORTED_ATTRIBUTES: &[u32] = &[
    FATTR4_SUPPORTED_ATTRS,
    FATTR4_TYPE,
    FATTR4_FH_EXPIRE_TYPE,
    FATTR4_CHANGE,
    FATTR4_SIZE,
    FATTR4_LINK_SUPPORT,
    FATTR4_SYMLINK_SUPPORT,
    FATTR4_NAMED_ATTR,
    FATTR4_FSID,
    FATTR4_UNIQUE_HANDLES,
    FATTR4_LEASE_TIME,
    FATTR4_RDATTR_ERROR,
    FATTR4_FILEHANDLE,
    FATTR4_FILEID,
    FATTR4_MAXFILESIZE,
    FATTR4_MAXNAME,
    FATTR4_MAXREAD,
    FATTR4_MAXWRITE,
    FATTR4_MODE,
    FATTR4_NUMLINKS,
    FATTR4_OWNER,
    FATTR4_OWNER_GROUP,
    FATTR4_SPACE_USED,
    FATTR4_TIME_ACCESS,
    FATTR4_TIME_ACCESS_SET,
    FATTR4_TIME_METADATA,
    FATTR4_TIME_MODIFY,
    FATTR4_TIME_MODIFY_SET,
    FATTR4_MOUNTED_ON_FILEID,
];

/// The subset of [`SUPPORTED_ATTRIBUTES`] a client may set.
pub const SETTABLE_ATTRIBUTES: &[u32] = &[
    FATTR4_SIZE,
    FATTR4_MODE,
    FATTR4_OWNER,
    FATTR4_OWNER_GROUP,
    FATTR4_TIME_ACCESS_SET,
    FATTR4_TIME_MODIFY_SET,
];

pub fn is_supported(id: u32) -> bool {
    SUPPORTED_ATTRIBUTES.contains(&id)
}

pub fn is_settable(id: u32) -> bool {
    SETTABLE_ATTRIBUTES.contains(&id)
}

/// Bitmap form of [`SUPPORTED_ATTRIBUTES`], the value of `supported_attrs`.
pub fn supported_attributes() -> bitmap4 {
    bitmap4::from_ids(SUPPORTED_ATTRIBUTES)
}

/// A single attribute value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribute {
    SupportedAttrs(bitmap4),
    Type(nfs_ftype4),
    FhExpireType(u32),
    Change(u64),
    Size(u64),
    LinkSupport(bool),
    SymlinkSupport(bool),
    NamedAttr(bool),
    Fsid(fsid4),
    UniqueHandles(bool),
    LeaseTime(u32),
    RdattrError(nfsstat4),
    FileHandle(nfs_fh4),
    FileId(u64),
    MaxFileSize(u64),
    MaxName(u32),
    MaxRead(u64),
    MaxWrite(u64),
    Mode(u32),
    NumLinks(u32),
    Owner(String),
    OwnerGroup(String),
    SpaceUsed(u64),
    TimeAccess(nfstime4),
    TimeAccessSet(settime4),
    TimeMetadata(nfstime4),
    TimeModify(nfstime4),
    TimeModifySet(settime4),
    MountedOnFileId(u64),
}

impl Attribute {
    /// The `FATTR4_*` identifier of this attribute.
    pub fn id(&self) -> u32 {
        match self {
            Attribute::SupportedAttrs(_) => FATTR4_SUPPORTED_ATTRS,
            Attribute::Type(_) => FATTR4_TYPE,
            Attribute::FhExpireType(_) => FATTR4_FH_EXPIRE_TYPE,
            Attribute::Change(_) => FATTR4_CHANGE,
            Attribute::Size(_) => FATTR4_SIZE,
            Attribute::LinkSupport(_) => FATTR4_LINK_SUPPORT,
            Attribute::SymlinkSupport(_) => FATTR4_SYMLINK_SUPPORT,
            Attribute::NamedAttr(_) => FATTR4_NAMED_ATTR,
            Attribute::Fsid(_) => FATTR4_FSID,
            Attribute::UniqueHandles(_) => FATTR4_UNIQUE_HANDLES,
            Attribute::LeaseTime(_) => FATTR4_LEASE_TIME,
            Attribute::RdattrError(_) => FATTR4_RDATTR_ERROR,
            Attribute::FileHandle(_) => FATTR4_FILEHANDLE,
            Attribute::FileId(_) => FATTR4_FILEID,
            Attribute::MaxFileSize(_) => FATTR4_MAXFILESIZE,
            Attribute::MaxName(_) => FATTR4_MAXNAME,
            Attribute::MaxRead(_) => FATTR4_MAXREAD,
            Attribute::MaxWrite(_) => FATTR4_MAXWRITE,
            Attribute::Mode(_) => FATTR4_MODE,
            Attribute::NumLinks(_) => FATTR4_NUMLINKS,
            Attribute::Owner(_) => FATTR4_OWNER,
            Attribute::OwnerGroup(_) => FATTR4_OWNER_GROUP,
            Attribute::SpaceUsed(_) => FATTR4_SPACE_USED,
            Attribute::TimeAccess(_) => FATTR4_TIME_ACCESS,
            Attribute::TimeAccessSet(_) => FATTR4_TIME_ACCESS_SET,
            Attribute::TimeMetadata(_) => FATTR4_TIME_METADATA,
            Attribute::TimeModify(_) => FATTR4_TIME_MODIFY,
            Attribute::TimeModifySet(_) => FATTR4_TIME_MODIFY_SET,
            Attribute::MountedOnFileId(_) => FATTR4_MOUNTED_ON_FILEID,
        }
    }

    /// Reads the value of attribute `id` from `src`.
    ///
    /// Fails with `NFS4ERR_ATTRNOTSUPP` for identifiers outside
    /// [`SUPPORTED_ATTRIBUTES`] and `NFS4ERR_BADXDR` for malformed values.
    pub fn decode<R: Read>(id: u32, src: &mut R) -> Result<Attribute, nfsstat4> {
        Self::read_value(id, src)
            .map_err(|_| nfsstat4::NFS4ERR_BADXDR)?
            .ok_or(nfsstat4::NFS4ERR_ATTRNOTSUPP)
    }

    fn read_value<R: Read>(id: u32, src: &mut R) -> std::io::Result<Option<Attribute>> {
        let attr = match id {
            FATTR4_SUPPORTED_ATTRS => Attribute::SupportedAttrs(deserialize(src)?),
            FATTR4_TYPE => Attribute::Type(deserialize(src)?),
            FATTR4_FH_EXPIRE_TYPE => Attribute::FhExpireType(deserialize(src)?),
            FATTR4_CHANGE => Attribute::Change(deserialize(src)?),
            FATTR4_SIZE => Attribute::Size(deserialize(src)?),
            FATTR4_LINK_SUPPORT => Attribute::LinkSupport(deserialize(src)?),
            FATTR4_SYMLINK_SUPPORT => Attribute::SymlinkSupport(deserialize(src)?),
            FATTR4_NAMED_ATTR => Attribute::NamedAttr(deserialize(src)?),
            FATTR4_FSID => Attribute::Fsid(deserialize(src)?),
            FATTR4_UNIQUE_HANDLES => Attribute::UniqueHandles(deserialize(src)?),
            FATTR4_LEASE_TIME => Attribute::LeaseTime(deserialize(src)?),
            FATTR4_RDATTR_ERROR => Attribute::RdattrError(deserialize(src)?),
            FATTR4_FILEHANDLE => Attribute::FileHandle(deserialize(src)?),
            FATTR4_FILEID => Attribute::FileId(deserialize(src)?),
            FATTR4_MAXFILESIZE => Attribute::MaxFileSize(deserialize(src)?),
            FATTR4_MAXNAME => Attribute::MaxName(deserialize(src)?),
            FATTR4_MAXREAD => Attribute::MaxRead(deserialize(src)?),
            FATTR4_MAXWRITE => Attribute::MaxWrite(deserialize(src)?),
            FATTR4_MODE => Attribute::Mode(deserialize(src)?),
            FATTR4_NUMLINKS => Attribute::NumLinks(deserialize(src)?),
            FATTR4_OWNER => Attribute::Owner(deserialize(src)?),
            FATTR4_OWNER_GROUP => Attribute::OwnerGroup(deserialize(src)?),
            FATTR4_SPACE_USED => Attribute::SpaceUsed(deserialize(src)?),
            FATTR4_TIME_ACCESS => Attribute::TimeAccess(deserialize(src)?),
            FATTR4_TIME_ACCESS_SET => Attribute::TimeAccessSet(deserialize(src)?),
            FATTR4_TIME_METADATA => Attribute::TimeMetadata(deserialize(src)?),
            FATTR4_TIME_MODIFY => Attribute::TimeModify(deserialize(src)?),
            FATTR4_TIME_MODIFY_SET => Attribute::TimeModifySet(deserialize(src)?),
            FATTR4_MOUNTED_ON_FILEID => Attribute::MountedOnFileId(deserialize(src)?),
            _ => return Ok(None),
        };
        Ok(Some(attr))
    }
}

impl Serialize for Attribute {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            Attribute::SupportedAttrs(v) => v.serialize(dest),
            Attribute::Type(v) => v.serialize(dest),
            Attribute::FhExpireType(v)
            | Attribute::LeaseTime(v)
            | Attribute::MaxName(v)
            | Attribute::Mode(v)
            | Attribute::NumLinks(v) => v.serialize(dest),
            Attribute::Change(v)
            | Attribute::Size(v)
            | Attribute::FileId(v)
            | Attribute::MaxFileSize(v)
            | Attribute::MaxRead(v)
            | Attribute::MaxWrite(v)
            | Attribute::SpaceUsed(v)
            | Attribute::MountedOnFileId(v) => v.serialize(dest),
            Attribute::LinkSupport(v)
            | Attribute::SymlinkSupport(v)
            | Attribute::NamedAttr(v)
            | Attribute::UniqueHandles(v) => v.serialize(dest),
            Attribute::Fsid(v) => v.serialize(dest),
            Attribute::RdattrError(v) => v.serialize(dest),
            Attribute::FileHandle(v) => v.serialize(dest),
            Attribute::Owner(v) | Attribute::OwnerGroup(v) => v.serialize(dest),
            Attribute::TimeAccess(v) | Attribute::TimeMetadata(v) | Attribute::TimeModify(v) => {
                v.serialize(dest)
            }
            Attribute::TimeAccessSet(v) | Attribute::TimeModifySet(v) => v.serialize(dest),
        }
    }
}

/// Packs `values` into an `fattr4`, ordering them by identifier.
///
/// When the same identifier appears twice the first occurrence wins.
pub fn encode_attributes(mut values: Vec<Attribute>) -> std::io::Result<fattr4> {
    values.sort_by_key(Attribute::id);
    values.dedup_by_key(|attr| attr.id());

    let mut attrmask = bitmap4::new();
    let mut attr_vals = Vec::new();
    for attr in &values {
        attrmask.set(attr.id());
        attr.serialize(&mut attr_vals)?;
    }
    Ok(fattr4 { attrmask, attr_vals })
}

/// Unpacks every attribute named by `attrs.attrmask`.
///
/// The value blob must be consumed exactly; leftover or missing bytes are
/// `NFS4ERR_BADXDR`.
pub fn decode_attributes(attrs: &fattr4) -> Result<Vec<Attribute>, nfsstat4> {
    let mut src = Cursor::new(attrs.attr_vals.as_slice());
    let mut values = Vec::new();
    for id in attrs.attrmask.ids() {
        values.push(Attribute::decode(id, &mut src)?);
    }
    if src.position() != attrs.attr_vals.len() as u64 {
        return Err(nfsstat4::NFS4ERR_BADXDR);
    }
    Ok(values)
}

/// Decodes attributes sent by a client to be applied to an object
/// (SETATTR, CREATE, OPEN).
///
/// Unknown identifiers fail with `NFS4ERR_ATTRNOTSUPP`, read-only ones with
/// `NFS4ERR_INVAL`. The mask is checked before any value is read.
pub fn decode_settable_attributes(attrs: &fattr4) -> Result<Vec<Attribute>, nfsstat4> {
    for id in attrs.attrmask.ids() {
        if !is_supported(id) {
            return Err(nfsstat4::NFS4ERR_ATTRNOTSUPP);
        }
        if !is_settable(id) {
            return Err(nfsstat4::NFS4ERR_INVAL);
        }
    }
    decode_attributes(attrs)
}

/// Narrows a GETATTR/READDIR request to the attributes this server supports.
pub fn requested_attributes(request: &bitmap4) -> bitmap4 {
    request.intersection(&supported_attributes())
}

