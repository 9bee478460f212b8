//! Versions of a path and the metadata captured for each.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Timestamp of the origin sentinel, standing in for minus infinity.
pub const ORIGIN_TIMESTAMP: i64 = i64::MIN;

/// The stat fields tracked across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Mode,
    Inode,
    LinkCount,
    Owner,
    Group,
    Size,
    ModifyTime,
    ChangeTime,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Mode,
        Field::Inode,
        Field::LinkCount,
        Field::Owner,
        Field::Group,
        Field::Size,
        Field::ModifyTime,
        Field::ChangeTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Mode => "mode",
            Field::Inode => "inode",
            Field::LinkCount => "nlink",
            Field::Owner => "uid",
            Field::Group => "gid",
            Field::Size => "size",
            Field::ModifyTime => "mtime",
            Field::ChangeTime => "ctime",
        }
    }
}

/// Value of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(u64),
    /// Seconds since the epoch.
    Time(i64),
}

/// Field-to-value mapping carried by roll-up events.
pub type Payload = BTreeMap<Field, FieldValue>;

/// Metadata of a path at one version. Equal iff every field is equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSet {
    pub mode: u32,
    pub inode: u64,
    pub link_count: u64,
    pub owner: u32,
    pub group: u32,
    pub size: u64,
    pub modify_time: i64,
    pub change_time: i64,
}

impl AttributeSet {
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            mode: meta.mode(),
            inode: meta.ino(),
            link_count: meta.nlink(),
            owner: meta.uid(),
            group: meta.gid(),
            size: meta.size(),
            modify_time: meta.mtime(),
            change_time: meta.ctime(),
        }
    }

    /// `lstat` the path. `Ok(None)` when it doesn't exist.
    pub async fn read(path: &Path) -> io::Result<Option<Self>> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Mode => FieldValue::Int(self.mode.into()),
            Field::Inode => FieldValue::Int(self.inode),
            Field::LinkCount => FieldValue::Int(self.link_count),
            Field::Owner => FieldValue::Int(self.owner.into()),
            Field::Group => FieldValue::Int(self.group.into()),
            Field::Size => FieldValue::Int(self.size),
            Field::ModifyTime => FieldValue::Time(self.modify_time),
            Field::ChangeTime => FieldValue::Time(self.change_time),
        }
    }

    /// Fields whose values differ in `newer`, with `newer`'s values.
    pub fn diff(&self, newer: &AttributeSet) -> Payload {
        Field::ALL
            .into_iter()
            .filter(|field| self.get(*field) != newer.get(*field))
            .map(|field| (field, newer.get(field)))
            .collect()
    }

    /// Only the listed fields.
    pub fn select(&self, fields: &[Field]) -> Payload {
        fields.iter().map(|field| (*field, self.get(*field))).collect()
    }
}

/// Where a version came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum VersionSource {
    /// Synthetic predecessor of everything.
    Origin,
    /// The path as it is right now.
    Live,
    /// A retained snapshot.
    Snapshot(String),
}

impl VersionSource {
    fn rank(&self) -> u8 {
        match self {
            VersionSource::Origin => 0,
            VersionSource::Snapshot(_) => 1,
            VersionSource::Live => 2,
        }
    }
}

/// A path at one point in time; `attributes` is `None` when it didn't exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Version {
    pub path: PathBuf,
    pub timestamp: i64,
    pub source: VersionSource,
    pub attributes: Option<AttributeSet>,
}

impl Version {
    pub fn origin(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timestamp: ORIGIN_TIMESTAMP,
            source: VersionSource::Origin,
            attributes: None,
        }
    }

    pub fn live(path: impl Into<PathBuf>, timestamp: i64, attributes: Option<AttributeSet>) -> Self {
        Self {
            path: path.into(),
            timestamp,
            source: VersionSource::Live,
            attributes,
        }
    }

    pub fn snapshot(
        path: impl Into<PathBuf>,
        timestamp: i64,
        name: impl Into<String>,
        attributes: Option<AttributeSet>,
    ) -> Self {
        Self {
            path: path.into(),
            timestamp,
            source: VersionSource::Snapshot(name.into()),
            attributes,
        }
    }

    pub fn is_present(&self) -> bool {
        self.attributes.is_some()
    }

    /// Timeline order: timestamp, then origin < snapshots < live, then
    /// snapshot name so that snapshots sharing a second sort lexically.
    pub fn timeline_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.source.rank().cmp(&other.source.rank()))
            .then_with(|| match (&self.source, &other.source) {
                (VersionSource::Snapshot(a), VersionSource::Snapshot(b)) => a.cmp(b),
                _ => Ordering::Equal,
            })
    }
}

/// Sort versions into timeline order.
pub fn sort_timeline(versions: &mut [Version]) {
    versions.sort_by(Version::timeline_cmp);
}
