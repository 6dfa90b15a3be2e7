pub mod collection;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TethermapError};
pub use collection::{PixelSize, PointCollection};

/// One recorded annotation: `[x, y, plane, phase]`.
///
/// `x`/`y` are pixel coordinates, `plane` the z-plane index and `phase` the
/// contraction phase index. Plane and phase are stored as floats so the row
/// can be scaled into physical units without changing shape.
pub type PointRow = [f64; 4];

/// Display metadata for one annotation object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    pub id: String,
    pub color: String,
    pub marker: String,
    pub marker_size: f64,
}

impl ObjectDescriptor {
    pub fn new(id: &str, color: &str, marker: &str, marker_size: f64) -> Self {
        Self {
            id: id.to_string(),
            color: color.to_string(),
            marker: marker.to_string(),
            marker_size,
        }
    }
}

/// The four objects annotated on every heart: both tether chambers, the
/// AVCanal reference and the midline anchors.
pub fn default_objects() -> Vec<ObjectDescriptor> {
    vec![
        ObjectDescriptor::new("tether_Atrium", "#1f77b4", "o", 3.0),
        ObjectDescriptor::new("tether_Ventricle", "#ff7f0e", "o", 3.0),
        ObjectDescriptor::new("AVCanal", "black", "X", 5.0),
        ObjectDescriptor::new("Midline", "grey", "-x", 1.0),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub descriptor: ObjectDescriptor,
    pub has_instance: bool,
    coords: Vec<PointRow>,
}

impl ObjectEntry {
    fn new(descriptor: ObjectDescriptor, coords: Vec<PointRow>) -> Self {
        Self {
            has_instance: !coords.is_empty(),
            descriptor,
            coords,
        }
    }

    pub fn coords(&self) -> &[PointRow] {
        &self.coords
    }
}

/// Persisted form of one object: its descriptor and every recorded row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    #[serde(flatten)]
    pub descriptor: ObjectDescriptor,
    pub coords: Vec<PointRow>,
}

/// Serializable snapshot of an [`AnnotationStore`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationSession {
    pub objects: Vec<StoredObject>,
}

/// In-memory point store for one annotation session.
///
/// Objects keep the order of the descriptors they were created from. Every
/// mutation recomputes `has_instance` for all objects.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStore {
    objects: Vec<ObjectEntry>,
}

impl AnnotationStore {
    pub fn new(descriptors: Vec<ObjectDescriptor>) -> Result<Self> {
        let session = AnnotationSession {
            objects: descriptors
                .into_iter()
                .map(|descriptor| StoredObject {
                    descriptor,
                    coords: Vec::new(),
                })
                .collect(),
        };
        Self::from_session(session)
    }

    pub fn from_session(session: AnnotationSession) -> Result<Self> {
        let mut objects: Vec<ObjectEntry> = Vec::with_capacity(session.objects.len());
        for stored in session.objects {
            if objects.iter().any(|o| o.descriptor.id == stored.descriptor.id) {
                return Err(TethermapError::InvalidArgument(format!(
                    "duplicate object id '{}'",
                    stored.descriptor.id
                )));
            }
            for row in &stored.coords {
                validate_row(row)?;
            }
            objects.push(ObjectEntry::new(stored.descriptor, stored.coords));
        }
        Ok(Self { objects })
    }

    pub fn to_session(&self) -> AnnotationSession {
        AnnotationSession {
            objects: self
                .objects
                .iter()
                .map(|o| StoredObject {
                    descriptor: o.descriptor.clone(),
                    coords: o.coords.clone(),
                })
                .collect(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(|o| o.descriptor.id.as_str())
    }

    pub fn objects(&self) -> &[ObjectEntry] {
        &self.objects
    }

    pub fn entry(&self, object_id: &str) -> Result<&ObjectEntry> {
        self.objects
            .iter()
            .find(|o| o.descriptor.id == object_id)
            .ok_or_else(|| unknown_object(object_id))
    }

    fn entry_mut(&mut self, object_id: &str) -> Result<&mut ObjectEntry> {
        self.objects
            .iter_mut()
            .find(|o| o.descriptor.id == object_id)
            .ok_or_else(|| unknown_object(object_id))
    }

    pub fn points(&self, object_id: &str) -> Result<&[PointRow]> {
        Ok(self.entry(object_id)?.coords())
    }

    pub fn has_instance(&self, object_id: &str) -> Result<bool> {
        Ok(self.entry(object_id)?.has_instance)
    }

    pub fn len(&self, object_id: &str) -> Result<usize> {
        Ok(self.entry(object_id)?.coords.len())
    }

    /// Appends `coord` to the object. Duplicates are kept.
    pub fn add_point(&mut self, object_id: &str, coord: PointRow) -> Result<()> {
        validate_row(&coord)?;
        self.entry_mut(object_id)?.coords.push(coord);
        self.update_instances();
        Ok(())
    }

    /// Removes the row closest to `coord` among the rows sharing its plane
    /// and phase, measuring distance in `(x, y, plane)`. Ties go to the
    /// first row in storage order. Returns the removed row, or `None` when
    /// nothing was recorded in that plane and phase.
    pub fn remove_nearest_point(
        &mut self,
        object_id: &str,
        coord: PointRow,
    ) -> Result<Option<PointRow>> {
        validate_row(&coord)?;
        let entry = self.entry_mut(object_id)?;

        let mut best: Option<(usize, f64)> = None;
        for (i, row) in entry.coords.iter().enumerate() {
            if row[2] != coord[2] || row[3] != coord[3] {
                continue;
            }
            let d = distance_xyp(row, &coord);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }

        let removed = best.map(|(i, _)| entry.coords.remove(i));
        self.update_instances();
        Ok(removed)
    }

    /// Rows of `object_id` recorded in `plane` and `phase`.
    pub fn points_in_plane_phase(
        &self,
        object_id: &str,
        plane: f64,
        phase: f64,
    ) -> Result<Vec<PointRow>> {
        Ok(self
            .entry(object_id)?
            .coords
            .iter()
            .filter(|row| row[2] == plane && row[3] == phase)
            .copied()
            .collect())
    }

    /// Adds an empty object. Ids must stay unique.
    pub fn add_object(&mut self, descriptor: ObjectDescriptor) -> Result<()> {
        if self.objects.iter().any(|o| o.descriptor.id == descriptor.id) {
            return Err(TethermapError::InvalidArgument(format!(
                "duplicate object id '{}'",
                descriptor.id
            )));
        }
        self.objects.push(ObjectEntry::new(descriptor, Vec::new()));
        Ok(())
    }

    /// Drops an object that has no recorded points.
    pub fn remove_object(&mut self, object_id: &str) -> Result<ObjectDescriptor> {
        let idx = self
            .objects
            .iter()
            .position(|o| o.descriptor.id == object_id)
            .ok_or_else(|| unknown_object(object_id))?;
        if self.objects[idx].has_instance {
            return Err(TethermapError::InvalidArgument(format!(
                "object '{object_id}' still has recorded points"
            )));
        }
        Ok(self.objects.remove(idx).descriptor)
    }

    /// Snapshot of every object's rows keyed by id.
    pub fn collection(&self) -> PointCollection {
        let mut collection = PointCollection::default();
        for o in &self.objects {
            collection.insert(&o.descriptor.id, o.coords.clone());
        }
        collection
    }

    fn update_instances(&mut self) {
        for o in &mut self.objects {
            o.has_instance = !o.coords.is_empty();
        }
    }
}

fn unknown_object(object_id: &str) -> TethermapError {
    TethermapError::InvalidArgument(format!("unknown object id '{object_id}'"))
}

pub(crate) fn validate_row(row: &PointRow) -> Result<()> {
    if row.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(TethermapError::InvalidArgument(format!(
            "coordinate row {row:?} contains non-finite values"
        )))
    }
}

fn distance_xyp(a: &PointRow, b: &PointRow) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}
