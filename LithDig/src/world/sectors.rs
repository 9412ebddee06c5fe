//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT AND Apache-2.0
//!
//! Sector and portal topology

use glam::Vec3;
use serde::Serialize;
use tracing::warn;

use super::options::WorldVersion;
use crate::error::Result;
use crate::io::{BoundingBox, ByteReader, Plane, to_len_i32};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorPortal {
    pub points: Vec<Vec3>,
    pub plane: Plane,
    /// Stored like a plane; meaning unknown
    pub plane2: Plane,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sector {
    /// Jupiter EX only
    pub name: String,
    pub bounds: BoundingBox,
    pub planes: Vec<Plane>,
    pub portals: Vec<i32>,
    /// LT5 leading value, possibly an id
    pub unknown_f: f32,
    /// LT5 only
    pub unknown: [i32; 2],
    /// LT5 only
    pub unknown_ints: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorNode {
    pub sectors: Vec<i32>,
    pub unknown: i32,
    pub unknown_f: f32,
    pub left: i32,
    pub right: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectorData {
    pub portals: Vec<SectorPortal>,
    pub sectors: Vec<Sector>,
    pub nodes: Vec<SectorNode>,
    /// Header fields; the last is Jupiter EX only
    pub unknown: [i32; 5],
}

impl SectorData {
    /// Decode the sector section that ends the client part.
    ///
    /// # Errors
    /// Returns an error on truncation or negative counts.
    pub fn read(reader: &mut ByteReader, version: WorldVersion) -> Result<Self> {
        let sector_count = reader.read_count()?;
        let portal_count = reader.read_count()?;
        let node_count = reader.read_count()?;
        let mut unknown = [0; 5];
        for value in &mut unknown[..4] {
            *value = reader.read_i32()?;
        }
        if !version.is_loki() {
            unknown[4] = reader.read_i32()?;
        }

        let mut portals = Vec::with_capacity(portal_count);
        for _ in 0..portal_count {
            let point_count = if version.is_loki() {
                to_len_i32(reader.read_i32()?)?
            } else {
                usize::from(reader.read_u16()?)
            };
            portals.push(SectorPortal {
                points: reader.read_array(point_count)?,
                plane: reader.read_plane()?,
                plane2: reader.read_plane()?,
            });
        }

        let mut sectors = Vec::with_capacity(sector_count);
        for i in 0..sector_count {
            let sector = if version.is_loki() {
                let unknown_f = reader.read_f32()?;
                let bounds = reader.read_bbox()?;
                let portal_count = reader.read_count()?;
                let unknown_count = reader.read_count()?;
                let unknown = [reader.read_i32()?, reader.read_i32()?];
                let planes = reader.read_counted_array()?;
                let unknown_ints = reader.read_array(unknown_count)?;
                let portals = reader.read_array(portal_count)?;
                Sector {
                    name: String::new(),
                    bounds,
                    planes,
                    portals,
                    unknown_f,
                    unknown,
                    unknown_ints,
                }
            } else {
                let name = reader.read_string_i16()?;
                let bounds = reader.read_bbox()?;
                let planes = reader.read_counted_array()?;
                let portals = reader.read_counted_array()?;
                let id = reader.read_i32()?;
                if usize::try_from(id).ok() != Some(i) {
                    warn!("Sector #{i} '{name}' stores id {id}");
                }
                Sector {
                    name,
                    bounds,
                    planes,
                    portals,
                    ..Sector::default()
                }
            };
            sectors.push(sector);
        }

        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            nodes.push(SectorNode {
                sectors: reader.read_counted_array()?,
                unknown: reader.read_i32()?,
                unknown_f: reader.read_f32()?,
                left: reader.read_i32()?,
                right: reader.read_i32()?,
            });
        }

        Ok(Self {
            portals,
            sectors,
            nodes,
            unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_i32s(out: &mut Vec<u8>, values: &[i32]) {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn push_f32s(out: &mut Vec<u8>, values: &[f32]) {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    #[test]
    fn test_jupiter_sectors() {
        let mut data = Vec::new();
        push_i32s(&mut data, &[1, 1, 1, 0, 0, 0, 0, 9]);
        // portal with two points
        data.extend_from_slice(&2u16.to_le_bytes());
        push_f32s(&mut data, &[0.0; 6]);
        push_f32s(&mut data, &[0.0, 1.0, 0.0, 5.0, 0.0, 0.0, 1.0, 0.0]);
        // sector
        data.extend_from_slice(&4i16.to_le_bytes());
        data.extend_from_slice(b"Hall");
        push_f32s(&mut data, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        push_i32s(&mut data, &[0, 1, 0, 0]);
        // node
        push_i32s(&mut data, &[1, 0, 0]);
        push_f32s(&mut data, &[0.5]);
        push_i32s(&mut data, &[-1, -1]);

        let mut reader = ByteReader::from_bytes(data);
        let sectors = SectorData::read(&mut reader, WorldVersion::Fear).unwrap();
        assert!(reader.is_eof());
        assert_eq!(sectors.unknown[4], 9);
        assert_eq!(sectors.portals[0].points.len(), 2);
        assert_eq!(sectors.portals[0].plane.distance, 5.0);
        assert_eq!(sectors.sectors[0].name, "Hall");
        assert_eq!(sectors.sectors[0].portals, vec![0]);
        assert_eq!(sectors.nodes[0].sectors, vec![0]);
        assert_eq!(sectors.nodes[0].left, -1);
    }

    #[test]
    fn test_loki_sectors() {
        let mut data = Vec::new();
        push_i32s(&mut data, &[1, 0, 0, 0, 0, 0, 0]);
        push_f32s(&mut data, &[3.0]);
        push_f32s(&mut data, &[0.0; 6]);
        // portals, unknown ints, two unknowns, planes
        push_i32s(&mut data, &[2, 1, 7, 8, 0]);
        push_i32s(&mut data, &[42, 3, 4]);

        let mut reader = ByteReader::from_bytes(data);
        let sectors = SectorData::read(&mut reader, WorldVersion::Loki).unwrap();
        assert!(reader.is_eof());
        let sector = &sectors.sectors[0];
        assert_eq!(sector.unknown, [7, 8]);
        assert_eq!(sector.unknown_ints, vec![42]);
        assert_eq!(sector.portals, vec![3, 4]);
        assert!(sector.name.is_empty());
    }
}
