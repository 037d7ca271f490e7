mod common;

use anyhow::Result;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{error_fields, id_of, TestServer};

async fn create_quote(server: &TestServer, token: &str, company: &str, items: Value) -> Result<Value> {
    let (status, body) = server
        .post(
            "/quotes",
            token,
            json!({ "companyId": company, "clientName": "Cliente Teste", "items": items }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "create quote failed: {status} {body}");
    Ok(body)
}

async fn set_status(server: &TestServer, token: &str, id: &str, status: &str) -> Result<(StatusCode, Value)> {
    server
        .patch(&format!("/quotes/{id}/status"), token, Some(json!({ "status": status })))
        .await
}

#[tokio::test]
async fn quotes_are_numbered_sequentially_per_company() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.register("alice@example.com").await?;
    let company = server.company(&token, "Alice Co").await?;
    let other = server.company(&token, "Outra Co").await?;
    let items = json!([{ "description": "Pintura", "quantity": 3, "unitPrice": 120.5 }]);

    let pattern = Regex::new(r"^ORC-\d{4}-\d{3}$")?;
    let first = create_quote(&server, &token, &company, items.clone()).await?;
    let second = create_quote(&server, &token, &company, items.clone()).await?;
    let elsewhere = create_quote(&server, &token, &other, items).await?;

    let numbers: Vec<&str> = [&first, &second, &elsewhere]
        .iter()
        .filter_map(|q| q["number"].as_str())
        .collect();
    assert_eq!(numbers.len(), 3);
    assert!(numbers.iter().all(|n| pattern.is_match(n)), "{numbers:?}");
    assert!(numbers[0].ends_with("-001"));
    assert!(numbers[1].ends_with("-002"));
    assert!(numbers[2].ends_with("-001"));

    assert_eq!(first["status"], "DRAFT");
    assert_eq!(first["subtotal"], 361.5);
    assert_eq!(first["total"], 361.5);
    Ok(())
}

#[tokio::test]
async fn invalid_quotes_report_item_fields() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.register("alice@example.com").await?;
    let company = server.company(&token, "Alice Co").await?;

    let (status, body) = server
        .post(
            "/quotes",
            &token,
            json!({
                "companyId": company,
                "clientName": "",
                "items": [{ "description": "Ok", "quantity": 1, "unitPrice": 10 }, { "description": "", "quantity": 0, "unitPrice": 5 }],
                "discount": 500
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = error_fields(&body);
    for field in ["clientName", "items[1].description", "items[1].quantity", "discount"] {
        assert!(fields.iter().any(|f| f == field), "missing {field} in {body}");
    }

    let (status, body) = server
        .post("/quotes", &token, json!({ "companyId": company, "clientName": "X", "items": [] }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_fields(&body).iter().any(|f| f == "items"));
    Ok(())
}

#[tokio::test]
async fn status_workflow_and_executed_lock() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.register("alice@example.com").await?;
    let company = server.company(&token, "Alice Co").await?;
    let quote = create_quote(&server, &token, &company, json!([{ "description": "Obra", "quantity": 1, "unitPrice": 1000 }])).await?;
    let id = id_of(&quote)?;

    let (status, body) = set_status(&server, &token, &id, "EXECUTED").await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, body) = set_status(&server, &token, &id, "PAID").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    for next in ["SENT", "APPROVED", "EXECUTED"] {
        let (status, body) = set_status(&server, &token, &id, next).await?;
        assert_eq!(status, StatusCode::OK, "{next}: {body}");
        assert_eq!(body["status"], next);
    }

    let (status, body) = server
        .put(
            &format!("/quotes/{id}"),
            &token,
            json!({ "clientName": "Outro", "items": [{ "description": "Obra", "quantity": 1, "unitPrice": 1 }] }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
    let (status, _) = set_status(&server, &token, &id, "DRAFT").await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}

#[tokio::test]
async fn duplicate_starts_a_fresh_draft() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.register("alice@example.com").await?;
    let company = server.company(&token, "Alice Co").await?;
    let quote = create_quote(&server, &token, &company, json!([{ "description": "Obra", "quantity": 2, "unitPrice": 50 }])).await?;
    let id = id_of(&quote)?;
    set_status(&server, &token, &id, "SENT").await?;

    let (status, copy) = server
        .post(&format!("/quotes/{id}/duplicate"), &token, json!({}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{copy}");
    assert_ne!(copy["id"], quote["id"]);
    assert_ne!(copy["number"], quote["number"]);
    assert_eq!(copy["status"], "DRAFT");
    assert_eq!(copy["total"], quote["total"]);
    assert_ne!(copy["items"][0]["id"], quote["items"][0]["id"]);

    let (_, list) = server.get(&format!("/quotes?companyId={company}&status=DRAFT"), &token).await?;
    assert_eq!(list["pagination"]["total"], 1);
    Ok(())
}

#[tokio::test]
async fn comparison_groups_quoted_and_executed_by_category() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.register("alice@example.com").await?;
    let company = server.company(&token, "Alice Co").await?;
    let (status, category) = server
        .post(
            "/categories",
            &token,
            json!({ "companyId": company, "name": "Material", "type": "EXPENSE", "color": "#ef4444" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = id_of(&category)?;

    let quote = create_quote(
        &server,
        &token,
        &company,
        json!([
            { "description": "Tinta", "quantity": 2, "unitPrice": 100, "categoryId": category_id },
            { "description": "Visita", "quantity": 1, "unitPrice": 50 }
        ]),
    )
    .await?;
    let id = id_of(&quote)?;

    let (status, tx) = server
        .post(
            "/transactions",
            &token,
            json!({ "companyId": company, "month": "Maio", "year": 2025, "amount": 230, "category": "Material", "quoteId": id }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{tx}");

    let (status, comparison) = server.get(&format!("/quotes/{id}/comparison"), &token).await?;
    assert_eq!(status, StatusCode::OK, "{comparison}");
    assert_eq!(comparison["quotedTotal"], 250.0);
    assert_eq!(comparison["executedTotal"], 230.0);
    assert_eq!(comparison["difference"], -20.0);

    let rows = comparison["rows"].as_array().cloned().unwrap_or_default();
    let material = rows.iter().find(|r| r["category"] == "Material").cloned().unwrap_or_default();
    assert_eq!(material["quoted"], 200.0);
    assert_eq!(material["executed"], 230.0);
    assert_eq!(material["difference"], 30.0);
    Ok(())
}

#[tokio::test]
async fn templates_fill_new_quotes() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.register("alice@example.com").await?;
    let company = server.company(&token, "Alice Co").await?;

    let (status, template) = server
        .post(
            "/quote-templates",
            &token,
            json!({
                "companyId": company,
                "name": "Manutenção padrão",
                "items": [{ "description": "Revisão", "quantity": 1, "unitPrice": 180 }],
                "notes": "Validade de 15 dias"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{template}");
    let template_id = id_of(&template)?;

    let (status, quote) = server
        .post(
            "/quotes",
            &token,
            json!({ "companyId": company, "templateId": template_id, "clientName": "Cliente" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{quote}");
    assert_eq!(quote["items"][0]["description"], "Revisão");
    assert_eq!(quote["total"], 180.0);
    assert_eq!(quote["notes"], "Validade de 15 dias");

    let (status, list) = server
        .get(&format!("/quote-templates?companyId={company}"), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (status, _) = server.delete(&format!("/quote-templates/{template_id}"), &token).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn other_users_cannot_touch_quotes() -> Result<()> {
    let server = TestServer::start().await?;
    let alice = server.register("alice@example.com").await?;
    let bob = server.register("bob@example.com").await?;
    let company = server.company(&alice, "Alice Co").await?;
    let quote = create_quote(&server, &alice, &company, json!([{ "description": "Obra", "quantity": 1, "unitPrice": 10 }])).await?;
    let id = id_of(&quote)?;

    let (status, _) = server.get(&format!("/quotes/{id}"), &bob).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = set_status(&server, &bob, &id, "SENT").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server.post(&format!("/quotes/{id}/duplicate"), &bob, json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server.delete(&format!("/quotes/{id}"), &bob).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server.delete(&format!("/quotes/{id}"), &alice).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}
