//! Conversions between backing-store status and NFSv4 attributes.

use tracing::debug;

use crate::fs_util::MAX_NAME_LENGTH;
use crate::protocol::xdr::nfs4::attr::{self, Attribute, FH4_PERSISTENT};
use crate::protocol::xdr::nfs4::{bitmap4, fattr4, fsid4, nfs_fh4, nfsstat4};
use crate::state::ServerState;
use crate::store::{FileStatus, SetAttributes};

/// Values of the supported attributes named in `requested` for one object.
///
/// Unsupported identifiers are skipped. The write-only `*_SET` time
/// attributes have no value to report and are skipped as well.
pub fn build_attributes(
    state: &ServerState,
    requested: &bitmap4,
    fh: &nfs_fh4,
    status: &FileStatus,
) -> Vec<Attribute> {
    attr::requested_attributes(requested)
        .ids()
        .filter_map(|id| attribute_value(state, id, fh, status))
        .collect()
}

fn attribute_value(
    state: &ServerState,
    id: u32,
    fh: &nfs_fh4,
    status: &FileStatus,
) -> Option<Attribute> {
    let value = match id {
        attr::FATTR4_SUPPORTED_ATTRS => Attribute::SupportedAttrs(attr::supported_attributes()),
        attr::FATTR4_TYPE => Attribute::Type(status.kind.to_ftype4()),
        attr::FATTR4_FH_EXPIRE_TYPE => Attribute::FhExpireType(FH4_PERSISTENT),
        attr::FATTR4_CHANGE => Attribute::Change(status.change()),
        attr::FATTR4_SIZE => Attribute::Size(status.size),
        attr::FATTR4_LINK_SUPPORT => Attribute::LinkSupport(false),
        attr::FATTR4_SYMLINK_SUPPORT => Attribute::SymlinkSupport(false),
        attr::FATTR4_NAMED_ATTR => Attribute::NamedAttr(false),
        attr::FATTR4_FSID => Attribute::Fsid(fsid4 { major: 0, minor: 0 }),
        attr::FATTR4_UNIQUE_HANDLES => Attribute::UniqueHandles(true),
        attr::FATTR4_LEASE_TIME => Attribute::LeaseTime(state.config.lease_time),
        attr::FATTR4_RDATTR_ERROR => Attribute::RdattrError(nfsstat4::NFS4_OK),
        attr::FATTR4_FILEHANDLE => Attribute::FileHandle(fh.clone()),
        attr::FATTR4_FILEID => Attribute::FileId(status.fileid),
        attr::FATTR4_MAXFILESIZE => Attribute::MaxFileSize(i64::MAX as u64),
        attr::FATTR4_MAXNAME => Attribute::MaxName(MAX_NAME_LENGTH as u32),
        attr::FATTR4_MAXREAD => Attribute::MaxRead(state.config.max_io_size.into()),
        attr::FATTR4_MAXWRITE => Attribute::MaxWrite(state.config.max_io_size.into()),
        attr::FATTR4_MODE => Attribute::Mode(status.mode & 0o7777),
        attr::FATTR4_NUMLINKS => Attribute::NumLinks(status.nlink),
        attr::FATTR4_OWNER => Attribute::Owner(status.uid.to_string()),
        attr::FATTR4_OWNER_GROUP => Attribute::OwnerGroup(status.gid.to_string()),
        attr::FATTR4_SPACE_USED => Attribute::SpaceUsed(status.space_used),
        attr::FATTR4_TIME_ACCESS => Attribute::TimeAccess(status.atime),
        attr::FATTR4_TIME_METADATA => Attribute::TimeMetadata(status.ctime),
        attr::FATTR4_TIME_MODIFY => Attribute::TimeModify(status.mtime),
        attr::FATTR4_MOUNTED_ON_FILEID => Attribute::MountedOnFileId(status.fileid),
        _ => return None,
    };
    Some(value)
}

/// Builds the `fattr4` answering `requested` for one object.
pub fn encode_status(
    state: &ServerState,
    requested: &bitmap4,
    fh: &nfs_fh4,
    status: &FileStatus,
) -> Result<fattr4, nfsstat4> {
    attr::encode_attributes(build_attributes(state, requested, fh, status)).map_err(|e| {
        debug!("cannot encode attributes: {}", e);
        nfsstat4::NFS4ERR_SERVERFAULT
    })
}

/// Owners travel as strings. Numeric ids are accepted bare or as `id@domain`.
fn parse_id(owner: &str) -> Result<u32, nfsstat4> {
    let id = owner.split('@').next().unwrap_or(owner);
    id.parse::<u32>().map_err(|_| nfsstat4::NFS4ERR_BADOWNER)
}

/// Decodes client-supplied attributes into store changes.
///
/// Returns the changes and the bitmap of attributes they cover, which is what
/// SETATTR, CREATE and OPEN report back as applied.
pub fn decode_set_attributes(attrs: &fattr4) -> Result<(SetAttributes, bitmap4), nfsstat4> {
    let values = attr::decode_settable_attributes(attrs)?;
    let mut changes = SetAttributes::default();
    let mut applied = bitmap4::new();
    for value in values {
        applied.set(value.id());
        match value {
            Attribute::Size(size) => changes.size = Some(size),
            Attribute::Mode(mode) => changes.mode = Some(mode & 0o7777),
            Attribute::Owner(owner) => changes.uid = Some(parse_id(&owner)?),
            Attribute::OwnerGroup(group) => changes.gid = Some(parse_id(&group)?),
            Attribute::TimeAccessSet(time) => changes.atime = Some(time),
            Attribute::TimeModifySet(time) => changes.mtime = Some(time),
            _ => return Err(nfsstat4::NFS4ERR_INVAL),
        }
    }
    Ok((changes, applied))
}
