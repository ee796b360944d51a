//! 会員リソースを提供するHTTP APIサーバー
//!
//! 本バイナリは以下の機能を提供する:
//! - 挨拶とエコー (GET /, GET /header, GET /items/{item_id})
//! - マイル→キロメートル換算 (GET /convert)
//! - 会員一覧の取得 (GET /members)
//! - 会員の作成 (POST /member)

mod error;
mod member;
mod service;
mod store;

pub use error::ApiError;
pub use member::{MemberRecord, NewMember};
pub use service::{MemberError, MemberService};
pub use store::{SqliteMemberStore, StoreError};

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// データベースパス環境変数名
const DB_PATH_ENV: &str = "DB_PATH";

/// デフォルトのデータベースパス
const DEFAULT_DB_PATH: &str = "/var/lib/member-api/member.db";

/// CORS許可オリジン環境変数名（カンマ区切り、未設定なら許可なし）
const ALLOWED_ORIGINS_ENV: &str = "ALLOWED_ORIGINS";

/// マイル→キロメートルの換算係数
const MILE_TO_KM: f64 = 1.609344;

/// アプリケーション状態
///
/// ルーター全体で共有される状態を保持する。
#[derive(Clone)]
pub struct AppState {
    /// 会員サービス
    pub service: Arc<MemberService>,
}

/// 挨拶エンドポイント (GET /)
async fn root() -> Json<Value> {
    Json(json!({"Hello": "nice to meet you"}))
}

/// User-Agentエコーエンドポイント (GET /header)
///
/// リクエストのUser-Agentヘッダーをそのまま返す。
/// ヘッダーがない場合はnullを返す。
async fn header_echo(headers: HeaderMap) -> Json<Value> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());

    Json(json!({"User-Agent": user_agent}))
}

/// アイテムクエリパラメータ
#[derive(Debug, Deserialize)]
struct ItemQuery {
    /// 任意の検索文字列
    q: Option<String>,
}

/// アイテムエコーエンドポイント (GET /items/{item_id})
///
/// パスのitem_idとクエリのqをそのまま返す。
async fn read_item(Path(item_id): Path<i64>, Query(query): Query<ItemQuery>) -> Json<Value> {
    Json(json!({"item_id": item_id, "q": query.q}))
}

/// 換算クエリパラメータ
#[derive(Debug, Deserialize)]
struct ConvertQuery {
    /// マイル値
    mile: f64,
}

/// マイル→キロメートル換算エンドポイント (GET /convert)
async fn convert(Query(query): Query<ConvertQuery>) -> Json<Value> {
    let km = query.mile * MILE_TO_KM;
    Json(json!({"km": km}))
}

/// 会員一覧エンドポイント (GET /members)
///
/// 全会員を `[id, name, role]` の3要素配列のJSON配列として返す。
/// 0件の場合は空配列を返す。
///
/// # Returns
/// - 200 OK: 会員一覧（JSON配列）
/// - 500 Internal Server Error: ストアエラー
async fn list_members_handler(State(state): State<AppState>) -> Response {
    match state.service.list_members().await {
        Ok(members) => {
            tracing::info!(count = members.len(), "会員一覧を返却");
            Json(members).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "会員一覧取得エラー");
            ApiError::internal_error(format!("データベースエラー: {}", e)).into_response()
        }
    }
}

/// 会員作成エンドポイント (POST /member)
///
/// リクエストボディを検証し、会員を1件挿入して入力をエコーバックする。
/// ボディのスキーマ違反（フィールド欠落・型不一致・不正JSON）は
/// サービス呼び出し前に422で拒否する。
///
/// # Returns
/// - 201 Created: 作成された会員（入力のエコー、idなし）
/// - 422 Unprocessable Entity: スキーマ違反または検証エラー
/// - 500 Internal Server Error: ストアエラー
async fn create_member_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewMember>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "会員作成リクエストのボディが不正");
            return ApiError::unprocessable_entity(rejection.body_text()).into_response();
        }
    };

    tracing::info!(name = %input.name, role = %input.role, "会員作成リクエストを受信");

    match state.service.create_member(input).await {
        Ok(created) => {
            tracing::info!(name = %created.name, "会員を作成");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(MemberError::Validation(message)) => {
            tracing::warn!(error = %message, "会員作成の検証エラー");
            ApiError::unprocessable_entity(message).into_response()
        }
        Err(MemberError::Store(e)) => {
            tracing::error!(error = %e, "会員作成エラー");
            ApiError::internal_error(format!("データベースエラー: {}", e)).into_response()
        }
    }
}

/// CORS許可オリジンのカンマ区切り文字列をパースする
///
/// 空文字列は空の許可リスト（クロスオリジン不可）として扱う。
///
/// # Panics
/// ヘッダー値として不正なオリジンが含まれる場合はパニックする
/// （起動時の設定エラーは即時に失敗させる）。
fn parse_allowed_origins(value: &str) -> Vec<HeaderValue> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .unwrap_or_else(|_| panic!("不正なCORSオリジンです: {}", origin))
        })
        .collect()
}

/// ルーターを構築する
///
/// 全エンドポイントのルーティングを定義し、CORS許可リストと
/// リクエストトレーシングを適用する。
/// TraceLayerによりmethod, path, status, latencyを自動記録する。
///
/// # Arguments
/// * `state` - アプリケーション状態
/// * `allowed_origins` - CORSで許可するオリジンのリスト
pub fn create_router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root))
        .route("/header", get(header_echo))
        .route("/items/{item_id}", get(read_item))
        .route("/convert", get(convert))
        .route("/members", get(list_members_handler))
        .route("/member", post(create_member_handler))
        .layer(cors)
        // リクエストトレーシングレイヤー（method, path, status, latencyを自動記録）
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// シャットダウンシグナルを待機する
///
/// SIGTERMまたはCtrl+C (SIGINT) を待機し、いずれかを受信したらリターンする。
/// axum::serve の with_graceful_shutdown() と組み合わせて使用することで、
/// 新規リクエストの受付停止と処理中リクエストの完了待機を実現する。
///
/// # Panics
/// シグナルハンドラーの登録に失敗した場合はパニックする。
async fn shutdown_signal() {
    // Ctrl+C (SIGINT) を待機
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Ctrl+C シグナルハンドラーの登録に失敗しました");
    };

    // SIGTERM を待機 (Unix系OSのみ)
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM シグナルハンドラーの登録に失敗しました")
            .recv()
            .await;
    };

    // Windows等の非Unix環境ではSIGTERMは利用不可
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C (SIGINT) を受信しました。graceful shutdownを開始します");
        }
        _ = terminate => {
            tracing::info!("SIGTERM を受信しました。graceful shutdownを開始します");
        }
    }
}

/// メイン関数
///
/// トレーシングを初期化し、HTTPサーバーを起動する。
/// サーバーは0.0.0.0:8000でリッスンする。
/// データベースを開けない場合やmemberテーブルがない場合、
/// CORSオリジン設定が不正な場合は起動時に即座に失敗する。
/// SIGTERMまたはCtrl+Cを受信するとgraceful shutdownを実行し、
/// 処理中のリクエスト完了を待ってからSQLiteコネクションを正常にクローズする。
///
/// # 環境変数
/// - `DB_PATH`: データベースファイルのパス（デフォルト: /var/lib/member-api/member.db）
/// - `ALLOWED_ORIGINS`: CORS許可オリジン（カンマ区切り、デフォルト: なし）
/// - `RUST_LOG`: ログレベル（デフォルト: info）
#[tokio::main]
async fn main() {
    // 構造化ログの初期化
    // RUST_LOG環境変数でログレベルを制御（デフォルト: info）
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("会員APIサーバーを起動します");

    // データベースパスを環境変数から取得
    let db_path = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
    tracing::info!("データベースパス: {}", db_path);

    // CORS許可オリジンを環境変数から取得（不正な値は起動失敗）
    let allowed_origins =
        parse_allowed_origins(&std::env::var(ALLOWED_ORIGINS_ENV).unwrap_or_default());
    tracing::info!(
        origin_count = allowed_origins.len(),
        "CORS許可オリジンを読み込みました"
    );

    // SQLite会員ストアを初期化（memberテーブルがなければ起動失敗）
    let store = Arc::new(
        SqliteMemberStore::open(&db_path)
            .await
            .expect("SQLiteストアの初期化に失敗しました"),
    );
    tracing::info!("SQLiteストアを初期化しました");

    let service = Arc::new(MemberService::new(store));
    let app = create_router(AppState { service }, allowed_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("リッスン開始: {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("アドレスのバインドに失敗しました");

    // graceful shutdownを有効にしてサーバーを起動
    // shutdown_signal()がシグナルを受信すると:
    // 1. 新規コネクションの受付を停止
    // 2. 処理中のリクエストの完了を待機
    // 3. サーバーが終了し、SQLiteコネクションが自動的にドロップされる
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("サーバーの起動に失敗しました");

    tracing::info!("サーバーが正常に停止しました");
}
