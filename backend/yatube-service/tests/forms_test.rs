//! Creating and editing posts and adding comments through the forms

mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use common::{location, multipart_body, rendered, TestContext, SMALL_GIF};
use yatube_service::models::PostFilter;

#[actix_web::test]
async fn test_create_post_redirects_to_profile() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    let app = ctx.app().await;

    let group_id = group.id.to_string();
    let req = test::TestRequest::post()
        .uri("/create/")
        .cookie(ctx.login_cookie(&author))
        .set_form([("text", "Новый пост"), ("group", group_id.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/auth/");
    assert_eq!(ctx.state.repo.count_posts(PostFilter::All).await.unwrap(), 1);

    let posts = ctx.state.repo.list_posts(PostFilter::All, 10, 0).await.unwrap();
    assert_eq!(posts[0].text, "Новый пост");
    assert_eq!(posts[0].author.username, "auth");
    assert_eq!(posts[0].group.as_ref().unwrap().id, group.id);
}

#[actix_web::test]
async fn test_create_post_redirect_encodes_username() {
    let ctx = TestContext::new();
    let author = ctx.create_user("leo@tolstoy.ru").await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri("/create/")
        .cookie(ctx.login_cookie(&author))
        .set_form([("text", "Новый пост"), ("group", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/profile/leo%40tolstoy.ru/");

    let req = test::TestRequest::get()
        .uri("/profile/leo%40tolstoy.ru/")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = rendered(&resp).unwrap();
    assert_eq!(page.template, "posts/profile.html");
    assert_eq!(page.context["author"]["username"], "leo@tolstoy.ru");
}

#[actix_web::test]
async fn test_create_post_with_image() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let app = ctx.app().await;

    let (content_type, body) = multipart_body(
        &[("text", "Пост с картинкой"), ("group", "")],
        Some(("image", "small.gif", SMALL_GIF)),
    );
    let req = test::TestRequest::post()
        .uri("/create/")
        .cookie(ctx.login_cookie(&author))
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let posts = ctx.state.repo.list_posts(PostFilter::All, 10, 0).await.unwrap();
    assert_eq!(posts.len(), 1);
    let image = posts[0].image.clone().expect("stored image");
    assert!(image.starts_with("posts/"));
    assert!(image.ends_with(".gif"));
    assert!(ctx.media_root.path().join(&image).exists());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/media/{}", image))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/gif"
    );
    let bytes = test::read_body(resp).await;
    assert_eq!(bytes.as_ref(), SMALL_GIF);
}

#[actix_web::test]
async fn test_media_directory_is_not_found() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(ctx.media_root.path().join("posts")).unwrap();
    std::fs::write(ctx.media_root.path().join("posts/a.gif"), SMALL_GIF).unwrap();
    let app = ctx.app().await;

    for uri in ["/media/posts/a.gif", "/media/posts", "/media/posts/", "/media/posts/b.gif"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        let expected = if uri.ends_with("a.gif") {
            StatusCode::OK
        } else {
            StatusCode::NOT_FOUND
        };
        assert_eq!(resp.status(), expected, "{}", uri);
    }
}

#[actix_web::test]
async fn test_invalid_post_form_rerenders_with_errors() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let app = ctx.app().await;

    let (content_type, body) = multipart_body(
        &[("text", ""), ("group", "999")],
        Some(("image", "fake.gif", &b"definitely not an image"[..])),
    );
    let req = test::TestRequest::post()
        .uri("/create/")
        .cookie(ctx.login_cookie(&author))
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let page = rendered(&resp).unwrap();
    assert_eq!(page.template, "posts/create_post.html");
    let errors = &page.context["form"]["errors"];
    assert!(errors.get("text").is_some());
    assert!(errors.get("group").is_some());
    assert!(errors.get("image").is_some());
    assert_eq!(ctx.state.repo.count_posts(PostFilter::All).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_author_edits_post() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let group = ctx.create_group("test-slug", "Тестовая группа").await;
    let post = ctx.create_post(&author, "Старый текст", Some(&group)).await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/edit/", post.id))
        .cookie(ctx.login_cookie(&author))
        .set_form([("text", "Новый текст"), ("group", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));

    let edited = ctx.state.repo.find_post(post.id).await.unwrap().unwrap();
    assert_eq!(edited.text, "Новый текст");
    assert!(edited.group.is_none());
    assert_eq!(edited.pub_date, post.pub_date);
    assert_eq!(ctx.state.repo.count_posts(PostFilter::All).await.unwrap(), 1);
}

#[actix_web::test]
async fn test_non_author_cannot_edit() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let reader = ctx.create_user("reader").await;
    let post = ctx.create_post(&author, "Старый текст", None).await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/edit/", post.id))
        .cookie(ctx.login_cookie(&reader))
        .set_form([("text", "Чужая правка"), ("group", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));
    let unchanged = ctx.state.repo.find_post(post.id).await.unwrap().unwrap();
    assert_eq!(unchanged.text, "Старый текст");
}

#[actix_web::test]
async fn test_comment_added_and_shown() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let reader = ctx.create_user("reader").await;
    let post = ctx.create_post(&author, "Тестовый пост", None).await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/comment/", post.id))
        .cookie(ctx.login_cookie(&reader))
        .set_form([("text", "Отличный пост")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/posts/{}/", post.id));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/posts/{}/", post.id))
            .to_request(),
    )
    .await;
    let page = rendered(&resp).unwrap();
    let comments = page.context["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["text"], "Отличный пост");
    assert_eq!(comments[0]["author"]["username"], "reader");
}

#[actix_web::test]
async fn test_empty_comment_dropped() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let post = ctx.create_post(&author, "Тестовый пост", None).await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/comment/", post.id))
        .cookie(ctx.login_cookie(&author))
        .set_form([("text", "   ")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(ctx.state.repo.list_comments(post.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn test_anonymous_comment_not_saved() {
    let ctx = TestContext::new();
    let author = ctx.create_user("auth").await;
    let post = ctx.create_post(&author, "Тестовый пост", None).await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/posts/{}/comment/", post.id))
        .set_form([("text", "Аноним")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert!(ctx.state.repo.list_comments(post.id).await.unwrap().is_empty());
}
