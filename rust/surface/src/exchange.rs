// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON mesh exchange documents.
//!
//! A [`MeshDocument`] carries points, zero-based triangles, optional
//! per-point and per-triangle metadata, a header and the topology type
//! string. Indices and metadata lengths are validated before a document is
//! turned into a [`Surface`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::surface::{Hemisphere, Surface, SurfaceType};
use crate::topology::{Tile, Topology, TopologyType};

/// Free-form key/value metadata attached to one point or triangle.
pub type Metadata = BTreeMap<String, String>;

/// Document-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinate_frame: Option<String>,
    /// Hemisphere tag (`left`, `right`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    /// Surface type name (`FIDUCIAL`, `SPHERICAL`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surface_type: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    /// Topology metadata and any other keys.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: Metadata,
}

/// Serializable mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshDocument {
    #[serde(default)]
    pub header: MeshHeader,
    /// Topology perimeter ID (`CLOSED`, `OPEN`, `CUT`, `LOBAR_CUT`).
    #[serde(rename = "type", default)]
    pub topology_type: String,
    pub points: Vec<[f64; 3]>,
    pub triangles: Vec<Tile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_metadata: Option<Vec<Metadata>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triangle_metadata: Option<Vec<Metadata>>,
}

impl MeshDocument {
    /// Captures a surface and its topology.
    pub fn from_surface(surface: &Surface) -> Result<Self> {
        let topology = surface.require_topology()?;
        let header = MeshHeader {
            structure: Some(surface.hemisphere().name().to_string()),
            surface_type: Some(surface.surface_type().name().to_string()),
            comment: surface.comment().to_string(),
            extra: topology.all_metadata(),
            ..MeshHeader::default()
        };
        Ok(Self {
            header,
            topology_type: topology.topology_type().perimeter_id().to_string(),
            points: surface.coordinates().points().iter().map(|p| [p.x, p.y, p.z]).collect(),
            triangles: topology.tiles(),
            point_metadata: None,
            triangle_metadata: None,
        })
    }

    /// Checks triangle indices, coordinate values and metadata lengths.
    pub fn validate(&self) -> Result<()> {
        let nodes = self.points.len();
        if let Some(i) = self.points.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(Error::MalformedInput(format!("point {i} has a non-finite coordinate")));
        }
        for (tile, triangle) in self.triangles.iter().enumerate() {
            if let Some(&node) = triangle.iter().find(|&&n| n >= nodes) {
                return Err(Error::TileIndexOutOfRange { tile, node, nodes });
            }
        }
        let check_len = |what: &str, metadata: &Option<Vec<Metadata>>, expected: usize| match metadata {
            Some(m) if m.len() != expected => Err(Error::MalformedInput(format!(
                "{} {what} metadata entries for {expected} {what}s",
                m.len()
            ))),
            _ => Ok(()),
        };
        check_len("point", &self.point_metadata, nodes)?;
        check_len("triangle", &self.triangle_metadata, self.triangles.len())?;
        Ok(())
    }

    /// Builds a surface with a new topology after validating the document.
    pub fn to_surface(&self) -> Result<Surface> {
        self.validate()?;
        let topology = Topology::from_tiles(
            self.triangles.clone(),
            TopologyType::from_perimeter_id(&self.topology_type),
        );
        topology.set_number_of_nodes(self.points.len());
        for (key, value) in &self.header.extra {
            topology.set_metadata(key.clone(), value.clone());
        }

        let points = self.points.iter().map(|&[x, y, z]| Point3::new(x, y, z)).collect();
        let surface_type = self
            .header
            .surface_type
            .as_deref()
            .map_or(SurfaceType::Unspecified, SurfaceType::from_name);
        let mut surface = Surface::from_parts(points, Arc::new(topology), surface_type)?;
        if let Some(structure) = &self.header.structure {
            surface.set_hemisphere(Hemisphere::from_name(structure));
        }
        if !self.header.comment.is_empty() {
            surface.append_comment(&self.header.comment);
        }
        Ok(surface)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a document.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Self = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        tracing::debug!(path = %path.as_ref().display(), points = self.points.len(), "wrote mesh document");
        Ok(())
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let document = Self::from_json(&json)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            points = document.points.len(),
            triangles = document.triangles.len(),
            "read mesh document"
        );
        Ok(document)
    }
}

impl Surface {
    /// Replaces this surface with the contents of `document`. The surface
    /// is untouched when the document is malformed.
    pub fn load_document(&mut self, document: &MeshDocument) -> Result<()> {
        let loaded = document.to_surface()?;
        *self = loaded.with_config(self.config_handle());
        Ok(())
    }

    pub fn to_document(&self) -> Result<MeshDocument> {
        MeshDocument::from_surface(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{flat_grid, tetrahedron};

    #[test]
    fn document_round_trip_keeps_tags() {
        let mut surface = flat_grid(2);
        surface.set_hemisphere(Hemisphere::Right);
        surface.append_comment("made by hand");
        surface.topology().unwrap().set_metadata("resolution", "coarse");

        let json = surface.to_document().unwrap().to_json().unwrap();
        assert!(json.contains("\"type\""));
        let back = MeshDocument::from_json(&json).unwrap().to_surface().unwrap();

        assert_eq!(back.coordinates().points(), surface.coordinates().points());
        assert_eq!(back.topology().unwrap().tiles(), surface.topology().unwrap().tiles());
        assert_eq!(back.surface_type(), surface.surface_type());
        assert_eq!(back.hemisphere(), Hemisphere::Right);
        assert_eq!(back.topology().unwrap().topology_type(), surface.topology().unwrap().topology_type());
        assert_eq!(back.topology().unwrap().metadata("resolution").as_deref(), Some("coarse"));
        assert!(back.comment().contains("made by hand"));
    }

    #[test]
    fn out_of_range_triangle_is_rejected() {
        let json = r#"{ "type": "OPEN", "points": [[0,0,0],[1,0,0],[0,1,0]], "triangles": [[0,1,3]] }"#;
        assert!(matches!(
            MeshDocument::from_json(json),
            Err(Error::TileIndexOutOfRange { tile: 0, node: 3, nodes: 3 })
        ));
    }

    #[test]
    fn metadata_length_must_match() {
        let mut document = tetrahedron().to_document().unwrap();
        document.triangle_metadata = Some(vec![Metadata::new(); 4]);
        assert!(document.validate().is_ok());
        document.point_metadata = Some(vec![Metadata::new(); 2]);
        assert!(matches!(document.validate(), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn failed_load_leaves_surface_unchanged() {
        let mut surface = tetrahedron();
        let before = surface.coordinates().points().to_vec();
        let mut document = flat_grid(1).to_document().unwrap();
        document.triangles.push([0, 1, 17]);
        assert!(surface.load_document(&document).is_err());
        assert_eq!(surface.coordinates().points(), before.as_slice());

        document.triangles.pop();
        surface.load_document(&document).unwrap();
        assert_eq!(surface.number_of_nodes(), 4);
        assert_eq!(surface.topology().unwrap().number_of_tiles(), 2);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        assert!(matches!(MeshDocument::from_json("{ not json"), Err(Error::Serialization(_))));
    }

    #[test]
    fn file_round_trip() {
        let path = std::env::temp_dir().join(format!("brainmesh-exchange-{}.json", std::process::id()));
        let document = tetrahedron().to_document().unwrap();
        document.write(&path).unwrap();
        let back = MeshDocument::read(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, document);
        assert!(matches!(MeshDocument::read(&path), Err(Error::Io(_))));
    }
}
