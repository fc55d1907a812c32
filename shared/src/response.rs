//! Solver to host reports.
//!
//! A report is a flat `f32` buffer whose first slot is its [`ReportKind`] tag.
//!
//! World report: `[WORLD, ticks, body_count, body_count * WORLD_RECORD_LEN]`, each
//! record being `{id, matrix[16] (row-major), position[3], orientation[4],
//! linear_velocity[3], angular_velocity[3]}`.
//!
//! Collision report: `[COLLISIONS, contact_count, contact_count * COLLISION_RECORD_LEN]`,
//! each record being `{id_a, id_b, point[3], normal[3], linear_velocity_delta[3],
//! angular_velocity_delta[3], penetration_depth}`.

use bevy_math::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::{decode_body_id, BodyId};

pub const WORLD_HEADER_LEN: usize = 3;
pub const WORLD_RECORD_LEN: usize = 30;
pub const COLLISION_HEADER_LEN: usize = 2;
pub const COLLISION_RECORD_LEN: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    World = 0,
    Collisions = 1,
}

impl ReportKind {
    fn tag(self) -> f32 {
        self as u8 as f32
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error("report buffer is empty")]
    Empty,
    #[error("unknown report tag {0}")]
    UnknownTag(f32),
    #[error("expected a {expected:?} report, got {actual:?}")]
    WrongKind { expected: ReportKind, actual: ReportKind },
    #[error("{kind:?} report has an invalid record count {value}")]
    InvalidCount { kind: ReportKind, value: f32 },
    #[error("{kind:?} report declares {records} records but holds {len} values")]
    Truncated { kind: ReportKind, records: usize, len: usize },
}

/// Reusable report storage.
///
/// A buffer has exactly one owner at a time. The solver fills it and hands it
/// to the host, the host reads it and hands it back by value, after which it
/// can no longer be touched:
///
/// ```compile_fail
/// use shared::response::ReportBuffer;
///
/// fn recycle(_buffer: ReportBuffer) {}
///
/// let buffer = ReportBuffer::default();
/// recycle(buffer);
/// let _ = buffer.as_slice();
/// ```
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ReportBuffer {
    data: Vec<f32>,
}

/// One body's entry in a world report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    pub id: BodyId,
    pub matrix: Mat4,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

/// One contact between two bodies in a collision report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactRecord {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub point: Vec3,
    pub normal: Vec3,
    pub relative_linear_velocity: Vec3,
    pub relative_angular_velocity: Vec3,
    pub penetration_depth: f32,
}

impl ReportBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        ReportBuffer { data: Vec::with_capacity(capacity) }
    }

    pub fn from_vec(data: Vec<f32>) -> Self {
        ReportBuffer { data }
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Empties the buffer, keeping its allocation.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Address of the backing storage, used to check that buffers are reused
    /// rather than reallocated.
    pub fn storage_ptr(&self) -> *const f32 {
        self.data.as_ptr()
    }

    pub fn kind(&self) -> Result<ReportKind, ReportError> {
        match self.data.first() {
            None => Err(ReportError::Empty),
            Some(&tag) if tag == ReportKind::World.tag() => Ok(ReportKind::World),
            Some(&tag) if tag == ReportKind::Collisions.tag() => Ok(ReportKind::Collisions),
            Some(&tag) => Err(ReportError::UnknownTag(tag)),
        }
    }

    /// Overwrites the buffer with a world report, keeping its allocation.
    pub fn write_world<'a>(&mut self, ticks: u32, bodies: impl IntoIterator<Item = &'a BodyState>) {
        self.data.clear();
        self.data.extend_from_slice(&[ReportKind::World.tag(), ticks as f32, 0.0]);

        let mut count = 0usize;
        for body in bodies {
            self.data.push(body.id as f32);
            self.data.extend_from_slice(&body.matrix.transpose().to_cols_array());
            self.data.extend_from_slice(&body.position.to_array());
            self.data.extend_from_slice(&body.orientation.to_array());
            self.data.extend_from_slice(&body.linear_velocity.to_array());
            self.data.extend_from_slice(&body.angular_velocity.to_array());
            count += 1;
        }

        self.data[2] = count as f32;
    }

    /// Overwrites the buffer with a collision report, keeping its allocation.
    pub fn write_collisions<'a>(&mut self, contacts: impl IntoIterator<Item = &'a ContactRecord>) {
        self.data.clear();
        self.data.extend_from_slice(&[ReportKind::Collisions.tag(), 0.0]);

        let mut count = 0usize;
        for contact in contacts {
            self.data.push(contact.body_a as f32);
            self.data.push(contact.body_b as f32);
            self.data.extend_from_slice(&contact.point.to_array());
            self.data.extend_from_slice(&contact.normal.to_array());
            self.data.extend_from_slice(&contact.relative_linear_velocity.to_array());
            self.data.extend_from_slice(&contact.relative_angular_velocity.to_array());
            self.data.push(contact.penetration_depth);
            count += 1;
        }

        self.data[1] = count as f32;
    }

    pub fn world(&self) -> Result<WorldReport<'_>, ReportError> {
        self.ensure_kind(ReportKind::World)?;
        let header = self.header(WORLD_HEADER_LEN, ReportKind::World)?;
        let records = count(header[2], ReportKind::World)?;
        let body = self.records(WORLD_HEADER_LEN, WORLD_RECORD_LEN, records, ReportKind::World)?;

        Ok(WorldReport { ticks: header[1] as u32, records: body })
    }

    pub fn collisions(&self) -> Result<CollisionReport<'_>, ReportError> {
        self.ensure_kind(ReportKind::Collisions)?;
        let header = self.header(COLLISION_HEADER_LEN, ReportKind::Collisions)?;
        let records = count(header[1], ReportKind::Collisions)?;
        let body = self.records(COLLISION_HEADER_LEN, COLLISION_RECORD_LEN, records, ReportKind::Collisions)?;

        Ok(CollisionReport { records: body })
    }

    fn ensure_kind(&self, expected: ReportKind) -> Result<(), ReportError> {
        let actual = self.kind()?;
        if actual != expected {
            return Err(ReportError::WrongKind { expected, actual });
        }
        Ok(())
    }

    fn header(&self, len: usize, kind: ReportKind) -> Result<&[f32], ReportError> {
        self.data
            .get(..len)
            .ok_or(ReportError::Truncated { kind, records: 0, len: self.data.len() })
    }

    fn records(&self, offset: usize, stride: usize, records: usize, kind: ReportKind) -> Result<&[f32], ReportError> {
        records
            .checked_mul(stride)
            .and_then(|len| len.checked_add(offset))
            .and_then(|end| self.data.get(offset..end))
            .ok_or(ReportError::Truncated { kind, records, len: self.data.len() })
    }
}

/// Reads a header count slot, which must hold a non-negative whole number.
fn count(value: f32, kind: ReportKind) -> Result<usize, ReportError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f32 {
        return Err(ReportError::InvalidCount { kind, value });
    }
    Ok(value as usize)
}

/// Borrowed view over a validated world report.
pub struct WorldReport<'a> {
    ticks: u32,
    records: &'a [f32],
}

impl<'a> WorldReport<'a> {
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn len(&self) -> usize {
        self.records.len() / WORLD_RECORD_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decoded records. A record whose id slot holds no valid body id is
    /// skipped.
    pub fn bodies(&self) -> impl Iterator<Item = BodyState> + 'a {
        self.records.chunks_exact(WORLD_RECORD_LEN).filter_map(|record| {
            let Some(id) = decode_body_id(record[0]) else {
                log::warn!("world record with invalid body id {}", record[0]);
                return None;
            };

            let mut matrix = [0.0; 16];
            matrix.copy_from_slice(&record[1..17]);

            Some(BodyState {
                id,
                matrix: Mat4::from_cols_array(&matrix).transpose(),
                position: Vec3::from_slice(&record[17..20]),
                orientation: Quat::from_slice(&record[20..24]),
                linear_velocity: Vec3::from_slice(&record[24..27]),
                angular_velocity: Vec3::from_slice(&record[27..30]),
            })
        })
    }
}

/// Borrowed view over a validated collision report.
pub struct CollisionReport<'a> {
    records: &'a [f32],
}

impl<'a> CollisionReport<'a> {
    pub fn len(&self) -> usize {
        self.records.len() / COLLISION_RECORD_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decoded records. A contact naming an invalid body id is skipped.
    pub fn contacts(&self) -> impl Iterator<Item = ContactRecord> + 'a {
        self.records.chunks_exact(COLLISION_RECORD_LEN).filter_map(|record| {
            let (Some(body_a), Some(body_b)) = (decode_body_id(record[0]), decode_body_id(record[1])) else {
                log::warn!("contact with invalid body ids {} and {}", record[0], record[1]);
                return None;
            };

            Some(ContactRecord {
                body_a,
                body_b,
                point: Vec3::from_slice(&record[2..5]),
                normal: Vec3::from_slice(&record[5..8]),
                relative_linear_velocity: Vec3::from_slice(&record[8..11]),
                relative_angular_velocity: Vec3::from_slice(&record[11..14]),
                penetration_depth: record[14],
            })
        })
    }
}
