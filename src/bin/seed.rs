use anyhow::Context;
use rust_decimal::Decimal;
use storefront_api::db::{DbPool, create_pool, run_migrations};
use uuid::Uuid;

struct SeedProduct {
    name: &'static str,
    slug: &'static str,
    description: &'static str,
    price: &'static str,
    variants: &'static [SeedVariant],
}

struct SeedVariant {
    sku: &'static str,
    size: Option<&'static str>,
    color: Option<&'static str>,
    price: Option<&'static str>,
    stock: i32,
}

const CATALOG: &[SeedProduct] = &[
    SeedProduct {
        name: "Ferris Hoodie",
        slug: "ferris-hoodie",
        description: "Warm hoodie for Rustaceans",
        price: "55.00",
        variants: &[
            SeedVariant { sku: "HOOD-S-ORG", size: Some("S"), color: Some("orange"), price: None, stock: 20 },
            SeedVariant { sku: "HOOD-M-ORG", size: Some("M"), color: Some("orange"), price: None, stock: 25 },
            SeedVariant { sku: "HOOD-XL-ORG", size: Some("XL"), color: Some("orange"), price: Some("59.00"), stock: 5 },
        ],
    },
    SeedProduct {
        name: "Ferris Mug",
        slug: "ferris-mug",
        description: "Coffee tastes better with Ferris",
        price: "12.00",
        variants: &[SeedVariant { sku: "MUG-STD", size: None, color: Some("white"), price: None, stock: 100 }],
    },
    SeedProduct {
        name: "Sticker Pack",
        slug: "sticker-pack",
        description: "Decorate your laptop",
        price: "5.00",
        variants: &[],
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = create_pool(&database_url, 2).await?;
    run_migrations(&pool).await?;

    for product in CATALOG {
        seed_product(&pool, product).await?;
    }

    println!("Seeded {} products", CATALOG.len());
    Ok(())
}

async fn seed_product(pool: &DbPool, product: &SeedProduct) -> anyhow::Result<()> {
    let price: Decimal = product.price.parse()?;
    let (product_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, slug, description, price, status)
        VALUES ($1, $2, $3, $4, $5, 'active')
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product.name)
    .bind(product.slug)
    .bind(product.description)
    .bind(price)
    .fetch_one(pool)
    .await?;

    for variant in product.variants {
        let price = variant.price.map(str::parse::<Decimal>).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, sku, price, stock_quantity, size, color)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(variant.sku)
        .bind(price)
        .bind(variant.stock)
        .bind(variant.size)
        .bind(variant.color)
        .execute(pool)
        .await?;
    }

    println!("Ensured product {} ({} variants)", product.slug, product.variants.len());
    Ok(())
}
