use std::collections::HashMap;

use async_trait::async_trait;

use rackview_core::{ArticleClass, Dimension, InventoryStatus, OverlayData};

use crate::client::{ApiError, LocationSearch, WarehouseClient};

/// The four collaborator calls the rack engine consumes.
///
/// Transport and retries belong to the implementation; sessions only see
/// results or an [`ApiError`].
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn search_by_location(
        &self,
        location_prefix: &str,
        warehouse_id: &str,
    ) -> Result<LocationSearch, ApiError>;

    async fn inventory_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<String, InventoryStatus>, ApiError>;

    async fn stockouts_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<String, u32>, ApiError>;

    async fn classification_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<u64, ArticleClass>, ApiError>;
}

#[async_trait]
impl LocationSource for WarehouseClient {
    async fn search_by_location(
        &self,
        location_prefix: &str,
        warehouse_id: &str,
    ) -> Result<LocationSearch, ApiError> {
        WarehouseClient::search_by_location(self, location_prefix, warehouse_id).await
    }

    async fn inventory_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<String, InventoryStatus>, ApiError> {
        WarehouseClient::inventory_by_location(self, rack_code, warehouse_id).await
    }

    async fn stockouts_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<String, u32>, ApiError> {
        WarehouseClient::stockouts_by_location(self, rack_code, warehouse_id).await
    }

    async fn classification_by_location(
        &self,
        rack_code: &str,
        warehouse_id: &str,
    ) -> Result<HashMap<u64, ArticleClass>, ApiError> {
        WarehouseClient::classification_by_location(self, rack_code, warehouse_id).await
    }
}

/// Fetches the data for one overlay dimension from its source endpoint.
pub async fn load_overlay<S>(
    source: &S,
    dimension: Dimension,
    rack_code: &str,
    warehouse_id: &str,
) -> Result<OverlayData, ApiError>
where
    S: LocationSource + ?Sized,
{
    let data = match dimension {
        Dimension::Inventario => OverlayData::Inventario(
            source.inventory_by_location(rack_code, warehouse_id).await?,
        ),
        Dimension::Quiebres => OverlayData::Quiebres(
            source.stockouts_by_location(rack_code, warehouse_id).await?,
        ),
        Dimension::Clases => OverlayData::Clases(
            source
                .classification_by_location(rack_code, warehouse_id)
                .await?,
        ),
    };
    Ok(data)
}
