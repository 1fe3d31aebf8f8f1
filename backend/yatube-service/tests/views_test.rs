//! Page contexts and pagination

mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::{page_texts, rendered, TestContext};

#[actix_web::test]
async fn test_index_context_shows_post_fields() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    let post = ctx.create_post(&author, "Тестовый пост", Some(&group)).await;
    let app = ctx.app().await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    let page = rendered(&resp).unwrap();

    let first = &page.context["page_obj"]["object_list"][0];
    assert_eq!(first["id"], post.id);
    assert_eq!(first["text"], "Тестовый пост");
    assert_eq!(first["author"]["username"], "auth");
    assert_eq!(first["group"]["slug"], "test-slug");
    assert_eq!(page.context["title"], "Последние обновления на сайте");
    assert!(page.context["user"].is_null());
}

#[actix_web::test]
async fn test_group_page_lists_only_its_posts() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    let other = ctx.create_group("other-slug", "Другая группа").await;
    ctx.create_post(&author, "Пост в группе", Some(&group)).await;
    ctx.create_post(&author, "Пост в другой группе", Some(&other)).await;
    ctx.create_post(&author, "Пост без группы", None).await;
    let app = ctx.app().await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/group/test-slug/").to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();

    assert_eq!(page.context["group"]["slug"], "test-slug");
    assert_eq!(page.context["group"]["title"], "Тестовая группа");
    assert_eq!(page_texts(&page), vec!["Пост в группе".to_string()]);
}

#[actix_web::test]
async fn test_profile_context() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let other = ctx.create_user("other").await;
    ctx.create_post(&author, "Первый", None).await;
    ctx.create_post(&author, "Второй", None).await;
    ctx.create_post(&other, "Чужой", None).await;
    let app = ctx.app().await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/profile/auth/").to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();

    assert_eq!(page.context["author"]["username"], "auth");
    assert_eq!(page.context["post_count"], 2);
    assert_eq!(page.context["following"], false);
    assert_eq!(
        page_texts(&page),
        vec!["Второй".to_string(), "Первый".to_string()]
    );
}

#[actix_web::test]
async fn test_post_detail_context() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    ctx.create_post(&author, "Другой пост", None).await;
    let post = ctx
        .create_post(&author, "Тестовый пост с длинным текстом", None)
        .await;
    let app = ctx.app().await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/{}/", post.id))
            .cookie(ctx.login_cookie(&author))
            .to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();

    assert_eq!(page.context["post"]["id"], post.id);
    assert_eq!(page.context["post_count"], 2);
    assert_eq!(page.context["is_author"], true);
    assert_eq!(page.context["title"], "Пост Тестовый пост с");
    assert_eq!(page.context["form"]["fields"]["text"]["kind"], "char");
    assert!(page.context["comments"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_create_and_edit_form_context() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    let post = ctx.create_post(&author, "Тестовый пост", Some(&group)).await;
    let app = ctx.app().await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/create/")
            .cookie(ctx.login_cookie(&author))
            .to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();
    let fields = &page.context["form"]["fields"];
    assert_eq!(fields["text"]["kind"], "char");
    assert_eq!(fields["group"]["kind"], "choice");
    assert_eq!(fields["image"]["kind"], "image");
    assert_eq!(fields["group"]["choices"].as_array().unwrap().len(), 2);
    assert_eq!(page.context["is_edit"], false);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/{}/edit/", post.id))
            .cookie(ctx.login_cookie(&author))
            .to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();
    assert_eq!(page.context["is_edit"], true);
    assert_eq!(page.context["post"]["id"], post.id);
    assert_eq!(page.context["form"]["fields"]["text"]["value"], "Тестовый пост");
    assert_eq!(
        page.context["form"]["fields"]["group"]["value"],
        group.id.to_string()
    );
}

#[actix_web::test]
async fn test_new_post_with_group_appears_on_its_pages_only() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    ctx.create_group("other-slug", "Другая группа").await;
    ctx.create_post(&author, "Новый пост", Some(&group)).await;
    let app = ctx.app().await;

    for (url, expected) in [
        ("/", true),
        ("/group/test-slug/", true),
        ("/profile/auth/", true),
        ("/group/other-slug/", false),
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(url).to_request()).await;
        let page = rendered(&resp).unwrap();
        assert_eq!(
            page_texts(&page).contains(&"Новый пост".to_string()),
            expected,
            "{}",
            url
        );
    }
}

#[actix_web::test]
async fn test_listings_paginate_ten_per_page() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let follower = ctx.create_user("follower").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    for i in 0..13 {
        ctx.create_post(&author, &format!("Пост {}", i), Some(&group))
            .await;
    }
    ctx.state
        .repo
        .create_follow(follower.id, author.id)
        .await
        .unwrap();
    let app = ctx.app().await;

    for url in ["/", "/group/test-slug/", "/profile/auth/", "/follow/"] {
        for (query, expected) in [("", 10), ("?page=2", 3)] {
            let req = test::TestRequest::get()
                .uri(&format!("{}{}", url, query))
                .cookie(ctx.login_cookie(&follower))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let page = rendered(&resp).unwrap();
            assert_eq!(page_texts(&page).len(), expected, "{}{}", url, query);
        }
    }
}

#[actix_web::test]
async fn test_out_of_range_page_shows_last_page() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    for i in 0..13 {
        ctx.create_post(&author, &format!("Пост {}", i), None).await;
    }
    let app = ctx.app().await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/profile/auth/?page=50").to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();
    assert_eq!(page.context["page_obj"]["number"], 2);
    assert_eq!(page_texts(&page).first().unwrap(), "Пост 2");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/profile/auth/?page=abc").to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();
    assert_eq!(page.context["page_obj"]["number"], 1);
    assert_eq!(page_texts(&page).first().unwrap(), "Пост 12");
}

#[actix_web::test]
async fn test_image_reaches_listing_context() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    let post = ctx.create_post(&author, "С картинкой", Some(&group)).await;
    ctx.state
        .repo
        .update_post(
            post.id,
            yatube_service::models::PostChanges {
                text: post.text.clone(),
                group_id: post.group_id,
                image: Some("posts/small.gif".to_string()),
            },
        )
        .await
        .unwrap();
    let app = ctx.app().await;

    for url in [
        "/".to_string(),
        "/group/test-slug/".to_string(),
        "/profile/auth/".to_string(),
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(&url).to_request()).await;
        let page = rendered(&resp).unwrap();
        assert_eq!(
            page.context["page_obj"]["object_list"][0]["image"],
            "posts/small.gif",
            "{}",
            url
        );
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/{}/", post.id))
            .to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();
    assert_eq!(page.context["post"]["image"], "posts/small.gif");
}
