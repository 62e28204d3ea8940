use std::{
  collections::HashMap,
  convert::{TryFrom, TryInto},
  fmt,
  num::NonZeroU64,
};

use crate::proto;

/// A provisioned volume as reported back to the CO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
  capacity_bytes: Option<NonZeroU64>,
  volume_id: String,
  volume_context: HashMap<String, String>,
}

impl Volume {
  pub fn new(volume_id: impl Into<String>, capacity_bytes: Option<NonZeroU64>) -> Self {
    Volume {
      capacity_bytes,
      volume_id: volume_id.into(),
      volume_context: HashMap::new(),
    }
  }

  /// Attach an entry to the opaque context the CO passes on to the node plugin.
  pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.volume_context.insert(key.into(), value.into());
    self
  }

  /// The identifier the CO hands back on every later call for this volume.
  #[inline]
  pub fn volume_id(&self) -> &str {
    &self.volume_id
  }

  /// `None` means the capacity is unknown.
  #[inline]
  pub fn capacity_bytes(&self) -> Option<NonZeroU64> {
    self.capacity_bytes
  }

  #[inline]
  pub fn volume_context(&self) -> &HashMap<String, String> {
    &self.volume_context
  }
}

impl From<Volume> for proto::Volume {
  fn from(value: Volume) -> Self {
    proto::Volume {
      capacity_bytes: value.capacity_bytes.map(|v| v.get() as i64).unwrap_or(0),
      volume_id: value.volume_id,
      volume_context: value.volume_context,
    }
  }
}

impl TryFrom<Volume> for proto::CreateVolumeResponse {
  type Error = tonic::Status;

  fn try_from(value: Volume) -> Result<Self, Self::Error> {
    Ok(proto::CreateVolumeResponse {
      volume: Some(value.into()),
    })
  }
}

#[derive(Debug)]
pub struct VolumeCapability {
  access_mode: AccessMode,
  access_type: AccessType,
}

impl VolumeCapability {
  #[inline]
  pub fn access_mode(&self) -> AccessMode {
    self.access_mode
  }

  #[inline]
  pub fn is_block(&self) -> bool {
    matches!(self.access_type, AccessType::Block)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessMode {
  Unknown,
  /// Can only be published once as read/write on a single node, at
  /// any given time.
  SingleNodeWriter,
  /// Can only be published once as readonly on a single node, at
  /// any given time.
  SingleNodeReaderOnly,
  /// Can be published as readonly at multiple nodes simultaneously.
  MultiNodeReaderOnly,
  /// Can be published at multiple nodes simultaneously. Only one of
  /// the node can be used as read/write. The rest will be readonly.
  MultiNodeSingleWriter,
  /// Can be published as read/write at multiple nodes
  /// simultaneously.
  MultiNodeMultiWriter,
  SingleNodeSingleWriter,
  SingleNodeMultiWriter,
}

impl From<proto::volume_capability::AccessMode> for AccessMode {
  fn from(value: proto::volume_capability::AccessMode) -> Self {
    use proto::volume_capability::access_mode::Mode;

    match Mode::from_i32(value.mode) {
      Some(Mode::SingleNodeWriter) => AccessMode::SingleNodeWriter,
      Some(Mode::SingleNodeReaderOnly) => AccessMode::SingleNodeReaderOnly,
      Some(Mode::MultiNodeReaderOnly) => AccessMode::MultiNodeReaderOnly,
      Some(Mode::MultiNodeSingleWriter) => AccessMode::MultiNodeSingleWriter,
      Some(Mode::MultiNodeMultiWriter) => AccessMode::MultiNodeMultiWriter,
      Some(Mode::SingleNodeSingleWriter) => AccessMode::SingleNodeSingleWriter,
      Some(Mode::SingleNodeMultiWriter) => AccessMode::SingleNodeMultiWriter,
      Some(Mode::Unknown) | None => AccessMode::Unknown,
    }
  }
}

#[derive(Debug)]
pub enum AccessType {
  /// Indicate that the volume will be accessed via the block device API.
  Block,

  /// Indicate that the volume will be accessed via the filesystem API.
  Mount(MountVolume),
}

impl From<proto::volume_capability::AccessType> for AccessType {
  fn from(value: proto::volume_capability::AccessType) -> Self {
    match value {
      proto::volume_capability::AccessType::Block(_) => AccessType::Block,
      proto::volume_capability::AccessType::Mount(v) => AccessType::Mount(v.into()),
    }
  }
}

pub struct MountVolume {
  fs_type: Option<String>,
  mount_flags: Vec<String>,
}

impl MountVolume {
  /// The filesystem type.
  #[inline]
  pub fn fs_type(&self) -> Option<&str> {
    self.fs_type.as_deref()
  }
}

impl From<proto::volume_capability::MountVolume> for MountVolume {
  fn from(value: proto::volume_capability::MountVolume) -> Self {
    let fs_type = match value.fs_type {
      v if v.is_empty() => None,
      v => Some(v),
    };

    MountVolume {
      fs_type,
      mount_flags: value.mount_flags,
    }
  }
}

impl fmt::Debug for MountVolume {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MountVolume")
      .field("fs_type", &self.fs_type)
      .field(
        "mount_flags",
        &format!("REDACTED ({} items)", self.mount_flags.len()),
      )
      .finish()
  }
}

impl TryFrom<proto::VolumeCapability> for VolumeCapability {
  type Error = tonic::Status;

  fn try_from(value: proto::VolumeCapability) -> Result<Self, Self::Error> {
    let access_mode = value
      .access_mode
      .ok_or_else(|| tonic::Status::invalid_argument("Missing access_mode for VolumeCapability"))?
      .into();

    let access_type = value
      .access_type
      .ok_or_else(|| tonic::Status::invalid_argument("Missing access_type for VolumeCapability"))?
      .into();

    Ok(VolumeCapability {
      access_mode,
      access_type,
    })
  }
}

/// Parse a list of wire capabilities, failing on the first malformed entry.
pub(crate) fn parse_capabilities(
  values: Vec<proto::VolumeCapability>,
) -> Result<Vec<VolumeCapability>, tonic::Status> {
  values.into_iter().map(TryInto::try_into).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityRange {
  AtLeast(NonZeroU64),
  AtMost(NonZeroU64),
  /// Effectively AtLeast(.0) & AtMost(.1)
  Between(NonZeroU64, NonZeroU64),
}

impl CapacityRange {
  /// The minimum size the volume must have, if the CO asked for one.
  #[inline]
  pub fn required_bytes(&self) -> Option<NonZeroU64> {
    match *self {
      CapacityRange::AtLeast(r) | CapacityRange::Between(r, _) => Some(r),
      CapacityRange::AtMost(_) => None,
    }
  }

  /// The maximum size the volume may have, if the CO set one.
  #[inline]
  pub fn limit_bytes(&self) -> Option<NonZeroU64> {
    match *self {
      CapacityRange::AtMost(l) | CapacityRange::Between(_, l) => Some(l),
      CapacityRange::AtLeast(_) => None,
    }
  }
}

/// `(0, 0)` on the wire means "no preference" and maps to `None`.
impl TryFrom<proto::CapacityRange> for Option<CapacityRange> {
  type Error = tonic::Status;

  fn try_from(value: proto::CapacityRange) -> Result<Self, Self::Error> {
    fn bytes(v: i64, error: &'static str) -> Result<Option<NonZeroU64>, tonic::Status> {
      if v < 0 {
        Err(tonic::Status::invalid_argument(error))
      } else {
        Ok(NonZeroU64::new(v as u64))
      }
    }

    let required = bytes(
      value.required_bytes,
      "CapacityRange.required_bytes cannot be negative",
    )?;
    let limit = bytes(
      value.limit_bytes,
      "CapacityRange.limit_bytes cannot be negative",
    )?;

    match (required, limit) {
      (None, None) => Ok(None),
      (Some(r), None) => Ok(Some(CapacityRange::AtLeast(r))),
      (None, Some(l)) => Ok(Some(CapacityRange::AtMost(l))),
      (Some(r), Some(l)) if l < r => Err(tonic::Status::invalid_argument(
        "CapacityRange.limit_bytes is smaller than required_bytes",
      )),
      (Some(r), Some(l)) => Ok(Some(CapacityRange::Between(r, l))),
    }
  }
}

/// Shorthand for optional wire capacity ranges.
pub(crate) fn parse_capacity_range(
  value: Option<proto::CapacityRange>,
) -> Result<Option<CapacityRange>, tonic::Status> {
  match value {
    None => Ok(None),
    Some(v) => v.try_into(),
  }
}
