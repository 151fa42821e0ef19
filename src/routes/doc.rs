use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddCartItemRequest, CartLine, CartView, MergeCartRequest, UpdateCartItemRequest},
        orders::{CheckoutRequest, OrderList, OrderWithItems, ShippingAddress, UpdateOrderStatusRequest},
        products::{ProductDetail, ProductList},
        reviews::{ModerateReviewRequest, RatingSummary, ReviewList, SubmitReviewRequest},
        wishlist::{ToggleOutcome, ToggleWishlistRequest, ToggleWishlistResponse, WishlistView},
    },
    entity::sea_orm_active_enums::{CartStatus, OrderStatus, ProductStatus, ReviewStatus},
    error::ErrorData,
    models::{Cart, CartItem, Order, OrderItem, Product, ProductVariant, Review, Wishlist, WishlistItem},
    response::{ApiResponse, Meta},
    routes::{admin, cart, checkout, health, orders, params, products, reviews, wishlist},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::list_reviews,
        products::submit_review,
        reviews::mark_helpful,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::merge_cart,
        checkout::checkout,
        checkout::get_by_key,
        orders::list_orders,
        orders::get_order,
        wishlist::get_wishlist,
        wishlist::toggle,
        admin::update_order_status,
        admin::moderate_review
    ),
    components(
        schemas(
            Product,
            ProductVariant,
            ProductStatus,
            Cart,
            CartItem,
            CartStatus,
            Order,
            OrderItem,
            OrderStatus,
            Wishlist,
            WishlistItem,
            Review,
            ReviewStatus,
            AddCartItemRequest,
            UpdateCartItemRequest,
            MergeCartRequest,
            CartView,
            CartLine,
            CheckoutRequest,
            ShippingAddress,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            ProductList,
            ProductDetail,
            SubmitReviewRequest,
            ModerateReviewRequest,
            RatingSummary,
            ReviewList,
            ToggleWishlistRequest,
            ToggleWishlistResponse,
            ToggleOutcome,
            WishlistView,
            ErrorData,
            params::Pagination,
            params::SortOrder,
            Meta,
            ApiResponse<OrderWithItems>,
            ApiResponse<CartView>,
            ApiResponse<ErrorData>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Cart", description = "Cart endpoints for guests and signed-in users"),
        (name = "Checkout", description = "Cart to order conversion"),
        (name = "Orders", description = "Order history endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
