use crate::geometry::{volume_id, GeometryError};
use crate::transport::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trajectory of one track as reported at end of event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub track_id: i32,
    pub parent_id: i32,
    pub pdg: i32,
    /// Logical volume holding the vertex.
    pub vertex_name: String,
    pub vertex: Vec3,
    #[serde(default)]
    pub points: Vec<Vec3>,
}

/// Walks from `track_id` up through the parent IDs and returns the matched
/// indices, child first. Stops at the first ID with no entry (the primary's
/// parent) and never revisits an index.
pub fn back_trace(track_id: i32, track_ids: &[i32], parent_ids: &[i32]) -> Vec<usize> {
    TrajectoryIndex::from_ids(track_ids, parent_ids).back_trace(track_id)
}

/// Track-ID lookup over one event's trajectories.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryIndex {
    positions: HashMap<i32, usize>,
    parents: Vec<i32>,
}

impl TrajectoryIndex {
    pub fn new(trajectories: &[Trajectory]) -> Self {
        let ids: Vec<i32> = trajectories.iter().map(|t| t.track_id).collect();
        let parents: Vec<i32> = trajectories.iter().map(|t| t.parent_id).collect();
        Self::from_ids(&ids, &parents)
    }

    pub fn from_ids(track_ids: &[i32], parent_ids: &[i32]) -> Self {
        let mut positions = HashMap::with_capacity(track_ids.len());
        for (idx, id) in track_ids.iter().enumerate() {
            positions.entry(*id).or_insert(idx);
        }
        Self {
            positions,
            parents: parent_ids.to_vec(),
        }
    }

    pub fn back_trace(&self, track_id: i32) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = track_id;
        while let Some(&idx) = self.positions.get(&current) {
            if chain.contains(&idx) {
                break;
            }
            chain.push(idx);
            match self.parents.get(idx) {
                Some(parent) => current = *parent,
                None => break,
            }
        }
        chain
    }
}

/// Trajectory output columns. Positions stay in engine length units.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectoryColumns {
    pub pdg: Vec<i32>,
    pub entries: Vec<i32>,
    pub vertex_volume: Vec<i32>,
    pub x_vertex: Vec<f64>,
    pub y_vertex: Vec<f64>,
    pub z_vertex: Vec<f64>,
    pub x_points: Vec<f64>,
    pub y_points: Vec<f64>,
    pub z_points: Vec<f64>,
}

impl TrajectoryColumns {
    pub fn clear(&mut self) {
        self.pdg.clear();
        self.entries.clear();
        self.vertex_volume.clear();
        self.x_vertex.clear();
        self.y_vertex.clear();
        self.z_vertex.clear();
        self.x_points.clear();
        self.y_points.clear();
        self.z_points.clear();
    }

    pub fn len(&self) -> usize {
        self.pdg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdg.is_empty()
    }

    fn push(&mut self, trajectory: &Trajectory) -> Result<(), GeometryError> {
        self.vertex_volume.push(volume_id(&trajectory.vertex_name)?);
        self.pdg.push(trajectory.pdg);
        self.x_vertex.push(trajectory.vertex.x);
        self.y_vertex.push(trajectory.vertex.y);
        self.z_vertex.push(trajectory.vertex.z);
        self.entries.push(trajectory.points.len() as i32);
        for point in &trajectory.points {
            self.x_points.push(point.x);
            self.y_points.push(point.y);
            self.z_points.push(point.z);
        }
        Ok(())
    }
}

/// Stores the ancestry chain of every hit, one chain per hit in hit order.
///
/// An unknown vertex volume aborts the fill.
pub fn filter_trajectories(
    hit_track_ids: &[i32],
    trajectories: &[Trajectory],
    out: &mut TrajectoryColumns,
) -> Result<(), GeometryError> {
    out.clear();
    if trajectories.is_empty() {
        return Ok(());
    }
    let index = TrajectoryIndex::new(trajectories);
    for track_id in hit_track_ids {
        for idx in index.back_trace(*track_id) {
            out.push(&trajectories[idx])?;
        }
    }
    Ok(())
}
