//! PlantVillage knowledge base.
//!
//! Maps the 38 classifier output indices to disease metadata. The order
//! MUST match the class order the classifier was trained with (the sorted
//! PlantVillage folder names).

use serde::{Deserialize, Serialize};

use crate::types::HealthStatus;

/// Number of classes the knowledge base covers
pub const NUM_CLASSES: usize = 38;

/// A static knowledge base entry
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeEntry {
    /// PlantVillage folder label (e.g. "Tomato___Late_blight")
    pub label: &'static str,
    pub status: HealthStatus,
    pub name: &'static str,
    pub description: &'static str,
    pub recommendations: &'static [&'static str],
}

/// Disease metadata resolved for a class index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub index: usize,
    pub status: HealthStatus,
    pub name: String,
    pub description: String,
    pub recommendations: Vec<String>,
}

impl ClassRecord {
    fn from_entry(index: usize, entry: &KnowledgeEntry) -> Self {
        Self {
            index,
            status: entry.status,
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            recommendations: entry.recommendations.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Placeholder record for an index the knowledge base does not cover
    pub fn unknown(index: usize) -> Self {
        Self {
            index,
            status: HealthStatus::Uncertain,
            name: format!("Unknown class ({})", index),
            description: "No knowledge base entry matches this class.".to_string(),
            recommendations: Vec::new(),
        }
    }
}

const fn diseased(
    label: &'static str,
    name: &'static str,
    description: &'static str,
    recommendations: &'static [&'static str],
) -> KnowledgeEntry {
    KnowledgeEntry {
        label,
        status: HealthStatus::Diseased,
        name,
        description,
        recommendations,
    }
}

const fn healthy(
    label: &'static str,
    name: &'static str,
    description: &'static str,
    recommendations: &'static [&'static str],
) -> KnowledgeEntry {
    KnowledgeEntry {
        label,
        status: HealthStatus::Healthy,
        name,
        description,
        recommendations,
    }
}

/// The fixed table, indexed by classifier output
pub static KNOWLEDGE_BASE: [KnowledgeEntry; NUM_CLASSES] = [
    diseased(
        "Apple___Apple_scab",
        "Apple: Scab",
        "Venturia inaequalis fungus. Olive-green to black velvety spots.",
        &["Preventive fungicides", "Collect fallen leaves", "Prune for ventilation"],
    ),
    diseased(
        "Apple___Black_rot",
        "Apple: Black Rot",
        "Botryosphaeria obtusa fungus. Frog-eye shaped leaf spots.",
        &["Remove mummified fruit", "Apply Captan", "Keep the orchard clean"],
    ),
    diseased(
        "Apple___Cedar_apple_rust",
        "Apple: Cedar Rust",
        "Bright yellow-orange spots on the upper leaf surface.",
        &["Remove nearby junipers", "Rust-specific fungicides", "Plant resistant varieties"],
    ),
    healthy(
        "Apple___healthy",
        "Apple: Healthy",
        "Vigorous leaf with no sign of pathogens.",
        &["Standard maintenance", "Regular watering"],
    ),
    healthy(
        "Blueberry___healthy",
        "Blueberry: Healthy",
        "Healthy foliage.",
        &["Keep soil pH acidic (4.5-5.5)", "Mulching"],
    ),
    diseased(
        "Cherry_(including_sour)___Powdery_mildew",
        "Cherry: Powdery Mildew",
        "White powdery coating on the leaves.",
        &["Sulfur-based fungicides", "Prune to let in more light"],
    ),
    healthy(
        "Cherry_(including_sour)___healthy",
        "Cherry: Healthy",
        "Plant free of stress.",
        &["Balanced fertilisation"],
    ),
    diseased(
        "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot",
        "Corn: Gray Leaf Spot (Cercospora)",
        "Rectangular grey lesions bounded by the leaf veins.",
        &["Crop rotation", "Resistant hybrids", "Fungicides"],
    ),
    diseased(
        "Corn_(maize)___Common_rust_",
        "Corn: Common Rust",
        "Oval cinnamon-brown pustules on both leaf surfaces.",
        &["Monitoring", "Apply fungicides if severe"],
    ),
    diseased(
        "Corn_(maize)___Northern_Leaf_Blight",
        "Corn: Northern Leaf Blight",
        "Long elliptical greyish lesions.",
        &["Residue management", "Rotate with soybean"],
    ),
    healthy(
        "Corn_(maize)___healthy",
        "Corn: Healthy",
        "Crop in good condition.",
        &["Adequate nitrogen"],
    ),
    diseased(
        "Grape___Black_rot",
        "Grape: Black Rot",
        "Circular brown spots with a dark border.",
        &["Fungicide programme", "Remove infected tissue"],
    ),
    diseased(
        "Grape___Esca_(Black_Measles)",
        "Grape: Esca (Black Measles)",
        "Dark stripes between the veins (tiger pattern).",
        &["Protect pruning wounds", "Remove dead vines"],
    ),
    diseased(
        "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
        "Grape: Leaf Blight",
        "Irregular dark spots.",
        &["Foliar fungicides", "Humidity control"],
    ),
    healthy(
        "Grape___healthy",
        "Grape: Healthy",
        "Healthy vine.",
        &["Canopy management"],
    ),
    diseased(
        "Orange___Haunglongbing_(Citrus_greening)",
        "Orange: Huanglongbing (HLB)",
        "Citrus greening. Asymmetric mottling and yellowing.",
        &["Control the psyllid vector", "Foliar nutrition", "Remove the tree if positive"],
    ),
    diseased(
        "Peach___Bacterial_spot",
        "Peach: Bacterial Spot",
        "Small angular spots and leaf drop.",
        &["Copper bactericides", "Resistant varieties"],
    ),
    healthy(
        "Peach___healthy",
        "Peach: Healthy",
        "Healthy tree.",
        &["Fruiting pruning"],
    ),
    diseased(
        "Pepper,_bell___Bacterial_spot",
        "Pepper: Bacterial Spot",
        "Water-soaked lesions that turn necrotic.",
        &["Clean seed", "Crop rotation", "Copper"],
    ),
    healthy(
        "Pepper,_bell___healthy",
        "Pepper: Healthy",
        "Vigorous plant.",
        &["Staking", "Consistent watering"],
    ),
    diseased(
        "Potato___Early_blight",
        "Potato: Early Blight",
        "Spots with concentric rings (target pattern).",
        &["Protective fungicides", "Avoid water stress"],
    ),
    diseased(
        "Potato___Late_blight",
        "Potato: Late Blight",
        "Large dark water-soaked spots. Highly destructive.",
        &["Urgent systemic fungicides", "Destroy infected foliage"],
    ),
    healthy(
        "Potato___healthy",
        "Potato: Healthy",
        "Healthy crop.",
        &["Hilling"],
    ),
    healthy(
        "Raspberry___healthy",
        "Raspberry: Healthy",
        "Healthy plant.",
        &["Prune old canes"],
    ),
    healthy(
        "Soybean___healthy",
        "Soybean: Healthy",
        "Crop without damage.",
        &["Insect monitoring"],
    ),
    diseased(
        "Squash___Powdery_mildew",
        "Squash: Powdery Mildew",
        "White powder on the leaf surface.",
        &["Fungicides (sulfur)", "Spacing for airflow"],
    ),
    diseased(
        "Strawberry___Leaf_scorch",
        "Strawberry: Leaf Scorch",
        "Irregular purple spots that merge together.",
        &["Sanitary clean-up", "Fungicides"],
    ),
    healthy(
        "Strawberry___healthy",
        "Strawberry: Healthy",
        "Healthy plant.",
        &["Drip irrigation"],
    ),
    diseased(
        "Tomato___Bacterial_spot",
        "Tomato: Bacterial Spot",
        "Small black dots with a yellow halo.",
        &["Copper + Mancozeb", "Avoid sprinkler irrigation"],
    ),
    diseased(
        "Tomato___Early_blight",
        "Tomato: Early Blight",
        "Brown spots with concentric rings on older leaves.",
        &["Prune lower leaves", "Mulching", "Fungicides"],
    ),
    diseased(
        "Tomato___Late_blight",
        "Tomato: Late Blight",
        "Fast-spreading irregular greenish to dark spots.",
        &["Apply fungicide immediately", "Ventilation"],
    ),
    diseased(
        "Tomato___Leaf_Mold",
        "Tomato: Leaf Mold",
        "Yellow spots on the upper surface, mould on the underside.",
        &["Reduce humidity", "Greenhouse ventilation"],
    ),
    diseased(
        "Tomato___Septoria_leaf_spot",
        "Tomato: Septoria Leaf Spot",
        "Many small circular spots with grey centres.",
        &["Remove affected leaves", "Rotation"],
    ),
    diseased(
        "Tomato___Spider_mites Two-spotted_spider_mite",
        "Tomato: Spider Mites",
        "Fine yellow stippling, mites present.",
        &["Acaricides", "Potassium soap", "Sulfur"],
    ),
    diseased(
        "Tomato___Target_Spot",
        "Tomato: Target Spot",
        "Large lesions with concentric rings.",
        &["Improve air circulation", "Fungicides"],
    ),
    diseased(
        "Tomato___Tomato_Yellow_Leaf_Curl_Virus",
        "Tomato: Yellow Leaf Curl Virus (TYLCV)",
        "Yellow leaves curled upwards (spoon shape).",
        &["Whitefly control", "Resistant varieties", "Remove plants"],
    ),
    diseased(
        "Tomato___Tomato_mosaic_virus",
        "Tomato: Mosaic Virus",
        "Light and dark green mosaic pattern.",
        &["Disinfect tools", "Remove diseased plants"],
    ),
    healthy(
        "Tomato___healthy",
        "Tomato: Healthy",
        "Vigorous plant.",
        &["Fertigation"],
    ),
];

/// Look up a class index, returning `None` when it is not covered
pub fn lookup(index: usize) -> Option<ClassRecord> {
    KNOWLEDGE_BASE
        .get(index)
        .map(|entry| ClassRecord::from_entry(index, entry))
}

/// Resolve a class index, synthesizing an `Uncertain` record for unknown indices
pub fn decode(index: usize) -> ClassRecord {
    lookup(index).unwrap_or_else(|| ClassRecord::unknown(index))
}

/// Get the PlantVillage folder label for a class index
pub fn class_label(index: usize) -> Option<&'static str> {
    KNOWLEDGE_BASE.get(index).map(|entry| entry.label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_index_decodes_to_its_entry() {
        for (index, entry) in KNOWLEDGE_BASE.iter().enumerate() {
            let record = decode(index);
            assert_eq!(record.index, index);
            assert_eq!(record.status, entry.status);
            assert_eq!(record.name, entry.name);
            assert_eq!(record.description, entry.description);
            assert_eq!(record.recommendations.len(), entry.recommendations.len());
            assert!(!record.recommendations.is_empty());
        }
    }

    #[test]
    fn test_known_entries() {
        let scab = decode(0);
        assert_eq!(scab.name, "Apple: Scab");
        assert_eq!(scab.status, HealthStatus::Diseased);

        let tomato = decode(37);
        assert_eq!(tomato.name, "Tomato: Healthy");
        assert_eq!(tomato.status, HealthStatus::Healthy);
        assert_eq!(tomato.recommendations, vec!["Fertigation".to_string()]);
    }

    #[test]
    fn test_out_of_range_is_unknown() {
        for index in [38, 39, 100, usize::MAX] {
            let record = decode(index);
            assert_eq!(record.status, HealthStatus::Uncertain);
            assert!(record.name.contains(&index.to_string()));
            assert!(!record.description.is_empty());
            assert!(record.recommendations.is_empty());
            assert!(lookup(index).is_none());
        }
    }

    #[test]
    fn test_healthy_entries_match_labels() {
        for entry in KNOWLEDGE_BASE.iter() {
            let labelled_healthy = entry.label.ends_with("healthy");
            assert_eq!(labelled_healthy, entry.status == HealthStatus::Healthy, "{}", entry.label);
        }
    }

    #[test]
    fn test_class_label() {
        assert_eq!(class_label(0), Some("Apple___Apple_scab"));
        assert_eq!(class_label(30), Some("Tomato___Late_blight"));
        assert_eq!(class_label(37), Some("Tomato___healthy"));
        assert_eq!(class_label(38), None);
    }
}
