use super::distance::magnitude;

/// One graph vertex. The magnitude is computed once at construction so the
/// node stays `Sync` and can be read from concurrent searches.
#[derive(Debug, Clone)]
pub struct HnswNode {
    pub id: u32,
    pub level: u8,
    pub vector: Vec<f32>,
    pub neighbors: Vec<Vec<u32>>,
    pub deleted: bool,
    magnitude: f32,
}

impl HnswNode {
    /// `max_layers` is usually the node's level + 1.
    pub fn new(id: u32, level: u8, vector: Vec<f32>, max_layers: usize) -> Self {
        let magnitude = magnitude(&vector);

        HnswNode {
            id,
            level,
            vector,
            neighbors: vec![Vec::new(); max_layers],
            deleted: false,
            magnitude,
        }
    }

    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    /// Layers above the node's level are ignored.
    pub fn add_neighbor(&mut self, layer: usize, neighbor_id: u32) {
        if let Some(list) = self.neighbors.get_mut(layer) {
            if !list.contains(&neighbor_id) {
                list.push(neighbor_id);
            }
        }
    }
}
