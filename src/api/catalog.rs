//! Views over the catalog and discount stores, plus manual discount application.

use actix_web::{get, post, put, web, HttpResponse};
use actix_web_validator::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::validation::ErrorResponse;
use crate::ingest::record::{Country, Discount, Product};
use crate::sink::{DiscountRegistry, ProductCatalog};

#[derive(Deserialize)]
struct CountryQuery {
    country: Option<String>,
}

/// Product with VAT and all registered discounts applied
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductWithFinalPrice {
    pub id: String,
    pub name: String,
    pub base_price: f64,
    pub country: String,
    pub taxed_price: f64,
}

/// `base * (1 + vat)`, then each discount compounded, rounded to cents
pub fn final_price(base_price: f64, country: Country, discounts: &[Discount]) -> f64 {
    let taxed = base_price * (1.0 + country.vat_rate());
    let discounted = discounts
        .iter()
        .fold(taxed, |acc, d| acc * (1.0 - d.percent / 100.0));
    (discounted * 100.0).round() / 100.0
}

fn priced(product: Product, country: Country, discounts: &DiscountRegistry) -> ProductWithFinalPrice {
    let applied = discounts.for_product(&product.id);
    let taxed_price = final_price(product.base_price, country, &applied);
    ProductWithFinalPrice {
        id: product.id,
        name: product.name,
        base_price: product.base_price,
        country: product.country,
        taxed_price,
    }
}

#[get("/products")]
async fn list_products(
    catalog: web::Data<ProductCatalog>,
    discounts: web::Data<DiscountRegistry>,
    query: web::Query<CountryQuery>,
) -> HttpResponse {
    let Some(country_param) = query.into_inner().country else {
        warn!("GET /products called without country parameter");
        return HttpResponse::BadRequest().json(ErrorResponse::new("Bad request", "country is required"));
    };
    let country: Country = match country_param.parse() {
        Ok(country) => country,
        Err(msg) => {
            warn!("Invalid country code: {}", country_param);
            return HttpResponse::BadRequest().json(ErrorResponse::new("Bad request", msg));
        }
    };

    let result: Vec<ProductWithFinalPrice> = catalog
        .in_country(country)
        .into_iter()
        .map(|p| priced(p, country, &discounts))
        .collect();

    info!("Returning {} product(s) with final prices for country={}", result.len(), country);
    HttpResponse::Ok().json(result)
}

#[get("/discounts/{product_id}")]
async fn product_discounts(
    discounts: web::Data<DiscountRegistry>,
    product_id: web::Path<String>,
) -> HttpResponse {
    let result = discounts.for_product(&product_id);
    debug!("Retrieved {} discount(s) for productId={}", result.len(), product_id);
    HttpResponse::Ok().json(result)
}

/// Apply one discount; the path id must name the discounted product
#[post("/products/{id}/discount")]
async fn apply_product_discount(
    discounts: web::Data<DiscountRegistry>,
    id: web::Path<String>,
    request: Json<Discount>,
) -> HttpResponse {
    let discount = request.into_inner();
    if *id != discount.product_id {
        warn!("Path id ({}) does not match request productId ({})", id, discount.product_id);
        return HttpResponse::BadRequest().json(ErrorResponse::new(
            "Bad request",
            "Path id must match productId",
        ));
    }
    HttpResponse::Ok().json(discounts.apply(&discount))
}

#[put("/discounts/apply")]
async fn apply_discount(discounts: web::Data<DiscountRegistry>, request: Json<Discount>) -> HttpResponse {
    HttpResponse::Ok().json(discounts.apply(&request))
}

pub fn catalog_config(config: &mut web::ServiceConfig) {
    config
        .service(list_products)
        .service(product_discounts)
        .service(apply_product_discount)
        .service(apply_discount);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::validation;
    use actix_web::http::StatusCode;
    use actix_web::test::{call_and_read_body_json, call_service, init_service, TestRequest};
    use actix_web::App;

    #[test]
    fn price_applies_vat_then_discounts() {
        let discounts = vec![
            Discount {
                product_id: "p1".into(),
                discount_id: "d1".into(),
                percent: 10.0,
            },
            Discount {
                product_id: "p1".into(),
                discount_id: "d2".into(),
                percent: 50.0,
            },
        ];
        assert_eq!(final_price(100.0, Country::Sweden, &[]), 125.0);
        assert_eq!(final_price(100.0, Country::Sweden, &discounts), 56.25);
        assert_eq!(final_price(10.0, Country::Germany, &[]), 11.9);
    }

    #[actix_web::test]
    async fn lists_priced_products_for_country() {
        let catalog = web::Data::new(ProductCatalog::new());
        let discounts = web::Data::new(DiscountRegistry::new());
        catalog.upsert(Product {
            id: "p1".into(),
            name: "Chair".into(),
            base_price: 100.0,
            country: "France".into(),
        });
        discounts.apply(&Discount {
            product_id: "p1".into(),
            discount_id: "d1".into(),
            percent: 20.0,
        });

        let app = init_service(
            App::new()
                .app_data(catalog.clone())
                .app_data(discounts.clone())
                .configure(catalog_config),
        )
        .await;

        let req = TestRequest::get().uri("/products?country=france").to_request();
        let body: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["id"], "p1");
        assert_eq!(body[0]["taxedPrice"], 96.0);

        let req = TestRequest::get().uri("/discounts/p1").to_request();
        let body: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["discountId"], "d1");
    }

    #[actix_web::test]
    async fn missing_or_unknown_country_is_bad_request() {
        let app = init_service(
            App::new()
                .app_data(web::Data::new(ProductCatalog::new()))
                .app_data(web::Data::new(DiscountRegistry::new()))
                .configure(catalog_config),
        )
        .await;

        for uri in ["/products", "/products?country=Atlantis"] {
            let resp = call_service(&app, TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[actix_web::test]
    async fn manual_discount_is_applied_once() {
        let discounts = web::Data::new(DiscountRegistry::new());
        let app = init_service(
            App::new()
                .app_data(web::Data::new(ProductCatalog::new()))
                .app_data(discounts.clone())
                .app_data(validation::json_config())
                .configure(catalog_config),
        )
        .await;
        let body = serde_json::json!({"productId": "p1", "discountId": "d1", "percent": 15.0});

        let req = TestRequest::post().uri("/products/p1/discount").set_json(&body).to_request();
        let resp: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(resp, serde_json::json!({"applied": true, "alreadyApplied": false}));

        let req = TestRequest::put().uri("/discounts/apply").set_json(&body).to_request();
        let resp: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(resp, serde_json::json!({"applied": false, "alreadyApplied": true}));

        assert_eq!(discounts.for_product("p1").len(), 1);
    }

    #[actix_web::test]
    async fn manual_discount_rejects_mismatch_and_invalid_percent() {
        let discounts = web::Data::new(DiscountRegistry::new());
        let app = init_service(
            App::new()
                .app_data(discounts.clone())
                .app_data(validation::json_config())
                .configure(catalog_config),
        )
        .await;

        let mismatched = serde_json::json!({"productId": "p2", "discountId": "d1", "percent": 15.0});
        let req = TestRequest::post().uri("/products/p1/discount").set_json(&mismatched).to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let out_of_range = serde_json::json!({"productId": "p1", "discountId": "d1", "percent": 150.0});
        let req = TestRequest::put().uri("/discounts/apply").set_json(&out_of_range).to_request();
        assert_eq!(call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        assert!(discounts.for_product("p1").is_empty());
        assert!(discounts.for_product("p2").is_empty());
    }
}
