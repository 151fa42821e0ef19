use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    dto::products::{ProductDetail, ProductList},
    entity::{
        product_variants::{self, Column as VariantCol, Entity as ProductVariants},
        products::{self, Column as ProdCol, Entity as Products},
        sea_orm_active_enums::ProductStatus,
    },
    error::{AppError, AppResult},
    models::{Product, ProductVariant},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    services::review_service,
    state::AppState,
};

/// A product, and optionally one of its variants, as currently listed.
#[derive(Debug, Clone)]
pub struct PurchasableLine {
    pub product: products::Model,
    pub variant: Option<product_variants::Model>,
}

impl PurchasableLine {
    pub fn unit_price(&self) -> Decimal {
        unit_price(&self.product, self.variant.as_ref())
    }
}

/// The variant's override when present, otherwise the product price.
pub fn unit_price(product: &products::Model, variant: Option<&product_variants::Model>) -> Decimal {
    variant.and_then(|v| v.price).unwrap_or(product.price)
}

pub async fn find_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<products::Model> {
    Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

pub async fn find_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Uuid,
) -> AppResult<product_variants::Model> {
    ProductVariants::find_by_id(variant_id)
        .filter(VariantCol::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Variant"))
}

/// Resolves what a shopper is asking to buy. Only active products qualify.
pub async fn resolve_line<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> AppResult<PurchasableLine> {
    let product = find_product(conn, product_id).await?;
    let variant = match variant_id {
        Some(id) => Some(find_variant(conn, product_id, id).await?),
        None => None,
    };
    if !product.status.is_purchasable() {
        return Err(AppError::InvalidState(format!(
            "product {product_id} is not available for purchase"
        )));
    }
    Ok(PurchasableLine { product, variant })
}

/// Atomically takes `quantity` units from a variant. Returns `false` and changes
/// nothing when fewer units are left.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> AppResult<bool> {
    let result = ProductVariants::update_many()
        .col_expr(
            VariantCol::StockQuantity,
            Expr::col(VariantCol::StockQuantity).sub(quantity),
        )
        .filter(VariantCol::Id.eq(variant_id))
        .filter(VariantCol::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all().add(ProdCol::Status.eq(ProductStatus::Active));
    if let Some(category_id) = query.category_id {
        condition = condition.add(ProdCol::CategoryId.eq(category_id));
    }
    if let Some(brand_id) = query.brand_id {
        condition = condition.add(ProdCol::BrandId.eq(brand_id));
    }

    let finder = Products::find()
        .filter(condition)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = find_product(&state.orm, id).await?;
    if product.status == ProductStatus::Draft {
        return Err(AppError::NotFound("Product"));
    }

    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(id))
        .order_by_asc(VariantCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductVariant::from)
        .collect();

    let rating = review_service::rating_summary(&state.pool, id).await?;

    let detail = ProductDetail {
        product: product.into(),
        variants,
        rating,
    };
    Ok(ApiResponse::success("Product", detail, Some(Meta::empty())))
}
