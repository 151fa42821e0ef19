pub mod cart_items;
pub mod carts;
pub mod order_items;
pub mod orders;
pub mod product_variants;
pub mod products;
pub mod reviews;
pub mod sea_orm_active_enums;
pub mod wishlist_items;
pub mod wishlists;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use wishlist_items::Entity as WishlistItems;
pub use wishlists::Entity as Wishlists;
