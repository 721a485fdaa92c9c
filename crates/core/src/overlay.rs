use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ArticleClass, ArticleLocationRecord, RackModel, StockStatus};

/// Independently sourced attribute dataset that can be layered onto a rack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Clases,
    Inventario,
    Quiebres,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Self::Clases, Self::Inventario, Self::Quiebres];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clases => "clases",
            Self::Inventario => "inventario",
            Self::Quiebres => "quiebres",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clases" => Some(Self::Clases),
            "inventario" => Some(Self::Inventario),
            "quiebres" => Some(Self::Quiebres),
            _ => None,
        }
    }
}

/// Inventory values for one article, keyed by `clave` in [`OverlayData::Inventario`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub existencia: i64,
    pub estatus: StockStatus,
}

pub const FALLBACK_EXISTENCIA: i64 = 0;
pub const FALLBACK_ESTATUS: StockStatus = StockStatus::SinDatos;
pub const FALLBACK_DIAS_QUIEBRE: u32 = 0;
pub const FALLBACK_CLASE: ArticleClass = ArticleClass::D;

/// Data fetched for one dimension.
///
/// Sources key their data differently: inventory and stock-out data are keyed
/// by `clave`, classification by `article_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayData {
    Inventario(HashMap<String, InventoryStatus>),
    Quiebres(HashMap<String, u32>),
    Clases(HashMap<u64, ArticleClass>),
}

impl OverlayData {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Inventario(_) => Dimension::Inventario,
            Self::Quiebres(_) => Dimension::Quiebres,
            Self::Clases(_) => Dimension::Clases,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Inventario(data) => data.len(),
            Self::Quiebres(data) => data.len(),
            Self::Clases(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a new model with this dimension's fields set on every article.
    ///
    /// Articles missing from the data get the dimension's fallback. Only the
    /// fields owned by this dimension are written.
    pub fn merge(&self, model: &RackModel) -> RackModel {
        match self {
            Self::Inventario(data) => merge_inventory(model, data),
            Self::Quiebres(data) => merge_stockouts(model, data),
            Self::Clases(data) => merge_classes(model, data),
        }
    }
}

/// Sets `existencia` and `estatus` from data keyed by `clave`.
pub fn merge_inventory(model: &RackModel, data: &HashMap<String, InventoryStatus>) -> RackModel {
    model.map_articles(|article| {
        let (existencia, estatus) = match data.get(&article.clave) {
            Some(status) => (status.existencia, status.estatus.clone()),
            None => (FALLBACK_EXISTENCIA, FALLBACK_ESTATUS),
        };
        ArticleLocationRecord {
            existencia: Some(existencia),
            estatus: Some(estatus),
            ..article.clone()
        }
    })
}

/// Sets `dias_quiebre` from data keyed by `clave`.
pub fn merge_stockouts(model: &RackModel, data: &HashMap<String, u32>) -> RackModel {
    model.map_articles(|article| ArticleLocationRecord {
        dias_quiebre: Some(
            data.get(&article.clave)
                .copied()
                .unwrap_or(FALLBACK_DIAS_QUIEBRE),
        ),
        ..article.clone()
    })
}

/// Sets `clase` from data keyed by `article_id`.
pub fn merge_classes(model: &RackModel, data: &HashMap<u64, ArticleClass>) -> RackModel {
    model.map_articles(|article| ArticleLocationRecord {
        clase: Some(
            data.get(&article.article_id)
                .copied()
                .unwrap_or(FALLBACK_CLASE),
        ),
        ..article.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RackBuilder;

    fn base_model() -> RackModel {
        let records = vec![
            ArticleLocationRecord::new(10, "A1", "Tornillo", "N1-09-01-01"),
            ArticleLocationRecord::new(11, "A2", "Tuerca", "N1-09-01-02"),
            ArticleLocationRecord::new(12, "A3", "Arandela", "N1-09-02-03"),
        ];
        RackBuilder::build("N1-09", &records, &["N1-09-02-04".to_string()])
    }

    fn inventory() -> OverlayData {
        OverlayData::Inventario(HashMap::from([
            (
                "A1".to_string(),
                InventoryStatus {
                    existencia: 40,
                    estatus: StockStatus::Disponible,
                },
            ),
            (
                "A3".to_string(),
                InventoryStatus {
                    existencia: 0,
                    estatus: StockStatus::Agotado,
                },
            ),
        ]))
    }

    fn stockouts() -> OverlayData {
        OverlayData::Quiebres(HashMap::from([("A3".to_string(), 12)]))
    }

    fn classes() -> OverlayData {
        OverlayData::Clases(HashMap::from([(10, ArticleClass::A), (11, ArticleClass::C)]))
    }

    fn article<'a>(model: &'a RackModel, clave: &str) -> &'a ArticleLocationRecord {
        model
            .articles()
            .find(|article| article.clave == clave)
            .expect("article present")
    }

    #[test]
    fn inventory_merge_sets_values_and_fallbacks() {
        let merged = inventory().merge(&base_model());

        let a1 = article(&merged, "A1");
        assert_eq!(a1.existencia, Some(40));
        assert_eq!(a1.estatus, Some(StockStatus::Disponible));

        let a2 = article(&merged, "A2");
        assert_eq!(a2.existencia, Some(FALLBACK_EXISTENCIA));
        assert_eq!(a2.estatus, Some(StockStatus::SinDatos));
    }

    #[test]
    fn stockout_merge_defaults_to_zero_days() {
        let merged = stockouts().merge(&base_model());
        assert_eq!(article(&merged, "A3").dias_quiebre, Some(12));
        assert_eq!(article(&merged, "A1").dias_quiebre, Some(0));
    }

    #[test]
    fn class_merge_is_keyed_by_article_id() {
        let mut model = base_model();
        // Same clave, different article id: the class follows the id.
        model = model.map_articles(|article| {
            let mut article = article.clone();
            if article.article_id == 11 {
                article.clave = "A1".to_string();
            }
            article
        });
        let merged = classes().merge(&model);

        let by_id: HashMap<u64, Option<ArticleClass>> = merged
            .articles()
            .map(|article| (article.article_id, article.clase))
            .collect();
        assert_eq!(by_id[&10], Some(ArticleClass::A));
        assert_eq!(by_id[&11], Some(ArticleClass::C));
        assert_eq!(by_id[&12], Some(ArticleClass::D));
    }

    #[test]
    fn merge_is_idempotent() {
        let base = base_model();
        for data in [inventory(), stockouts(), classes()] {
            let once = data.merge(&base);
            let twice = data.merge(&once);
            assert_eq!(once, twice, "dimension={}", data.dimension().as_str());
        }
    }

    #[test]
    fn merge_leaves_structure_untouched() {
        let base = base_model();
        for data in [inventory(), stockouts(), classes()] {
            let merged = data.merge(&base);
            assert_eq!(merged.code, base.code);
            assert_eq!(merged.total_bins, base.total_bins);
            assert_eq!(merged.total_article_records, base.total_article_records);
            assert_eq!(merged.levels.len(), base.levels.len());
            for (left, right) in merged.levels.iter().zip(&base.levels) {
                assert_eq!(left.level, right.level);
                let left_bins: Vec<_> = left
                    .bins()
                    .map(|bin| (bin.number, bin.full_code.clone(), bin.articles.len()))
                    .collect();
                let right_bins: Vec<_> = right
                    .bins()
                    .map(|bin| (bin.number, bin.full_code.clone(), bin.articles.len()))
                    .collect();
                assert_eq!(left_bins, right_bins);
            }
        }
    }

    #[test]
    fn merge_does_not_touch_other_dimensions() {
        let base = base_model();

        let with_classes = classes().merge(&base);
        let with_inventory = inventory().merge(&with_classes);
        for (before, after) in with_classes.articles().zip(with_inventory.articles()) {
            assert_eq!(before.clase, after.clase);
            assert_eq!(before.dias_quiebre, after.dias_quiebre);
        }

        let with_stockouts = stockouts().merge(&with_inventory);
        for (before, after) in with_inventory.articles().zip(with_stockouts.articles()) {
            assert_eq!(before.clase, after.clase);
            assert_eq!(before.existencia, after.existencia);
            assert_eq!(before.estatus, after.estatus);
        }
    }

    #[test]
    fn merges_commute() {
        let base = base_model();
        let forward = stockouts().merge(&inventory().merge(&classes().merge(&base)));
        let backward = classes().merge(&inventory().merge(&stockouts().merge(&base)));
        assert_eq!(forward, backward);
    }

    #[test]
    fn merge_does_not_mutate_input() {
        let base = base_model();
        let snapshot = base.clone();
        let _ = inventory().merge(&base);
        assert_eq!(base, snapshot);
        assert!(base.articles().all(|article| article.existencia.is_none()));
    }

    #[test]
    fn dimension_parses_route_names() {
        assert_eq!(Dimension::parse("Inventario"), Some(Dimension::Inventario));
        assert_eq!(Dimension::parse("quiebres"), Some(Dimension::Quiebres));
        assert_eq!(Dimension::parse("ventas"), None);
        for dimension in Dimension::ALL {
            assert_eq!(Dimension::parse(dimension.as_str()), Some(dimension));
        }
    }
}
