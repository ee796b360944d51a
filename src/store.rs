//! SQLite会員ストア
//!
//! memberテーブルへの一覧取得・挿入機能を提供する。
//! - 書き込み: 専用の単一接続（Arc<Mutex<Connection>>）
//! - 読み取り: deadpool-sqliteによるasync接続プール
//!
//! memberテーブルは外部で管理される前提であり、本ストアは
//! テーブルの作成・変更・マイグレーションを一切行わない。

use std::sync::{Arc, Mutex};

use deadpool_sqlite::{Config, Pool, Runtime};
use rusqlite::{named_params, Connection};
use thiserror::Error;

use crate::member::{self, MemberRecord};

/// ストアエラー
#[derive(Debug, Error)]
pub enum StoreError {
    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(String),

    /// プール取得エラー
    #[error("プールエラー: {0}")]
    Pool(String),

    /// 接続構築エラー
    #[error("接続構築エラー: {0}")]
    Build(String),

    /// memberテーブルが存在しない
    #[error("memberテーブルが存在しません: {0}")]
    MissingTable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<deadpool_sqlite::BuildError> for StoreError {
    fn from(err: deadpool_sqlite::BuildError) -> Self {
        StoreError::Build(err.to_string())
    }
}

impl From<deadpool_sqlite::PoolError> for StoreError {
    fn from(err: deadpool_sqlite::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

impl From<deadpool_sqlite::InteractError> for StoreError {
    fn from(err: deadpool_sqlite::InteractError) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// 一覧取得の固定ステートメント
///
/// カラムは位置で読み取るため `SELECT *` のまま使用する
/// （0 = id, 1 = name, 2 = role）。
const LIST_MEMBERS_SQL: &str = "SELECT * FROM member";

/// 挿入ステートメント
///
/// 利用者入力は必ず名前付きパラメータでバインドする。
/// 文字列連結によるSQL組み立ては行わない。
const INSERT_MEMBER_SQL: &str = "INSERT INTO member (name, role) VALUES (:name, :role)";

/// SQLite会員ストア
///
/// - 書き込み: 専用の単一接続（Arc<Mutex<Connection>>）
/// - 読み取り: deadpool-sqliteによるasync接続プール
///
/// どちらの経路も接続を1回の操作の間だけ保持し、リクエストを
/// またいで接続やトランザクションを持ち越さない。
pub struct SqliteMemberStore {
    /// 書き込み専用接続（挿入は低頻度のため単一接続で十分）
    write_conn: Arc<Mutex<Connection>>,
    /// 読み取り用async接続プール
    read_pool: Pool,
}

impl SqliteMemberStore {
    /// 新しいSqliteMemberStoreを作成
    ///
    /// データベースファイルを開き、WALモードを有効にしたうえで
    /// memberテーブルの存在を検証する。テーブルは外部管理のため、
    /// 存在しない場合はエラーを返す（作成はしない）。
    ///
    /// # Arguments
    /// * `db_path` - データベースファイルのパス
    ///
    /// # Returns
    /// * `Ok(SqliteMemberStore)` - 成功時
    /// * `Err(StoreError::MissingTable)` - memberテーブルがない
    /// * `Err(StoreError)` - その他のエラー
    pub async fn open(db_path: &str) -> Result<Self, StoreError> {
        let write_conn = Connection::open(db_path)?;
        write_conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;",
        )?;

        // memberテーブルの存在検証のみ。スキーマには触れない
        let table_exists: bool = write_conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'member'",
                [],
                |_| Ok(true),
            )
            .unwrap_or(false);
        if !table_exists {
            return Err(StoreError::MissingTable(db_path.to_string()));
        }

        // 読み取り用プールを作成（最大4接続）
        // builder()はInfallibleを返すためexpect()を使用
        let cfg = Config::new(db_path);
        let read_pool = cfg
            .builder(Runtime::Tokio1)
            .expect("Config builder should not fail")
            .max_size(4)
            .build()?;

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
        })
    }

    /// 全会員の行を取得
    ///
    /// 読み取りプールから接続を1回の操作の間だけ取得し、固定の
    /// SELECT文を実行して全行をMemberRecordに変換して返す。
    /// 0件の場合は空のVecを返す（エラーにはしない）。
    /// 行の変換エラーを含むストアエラーはそのまま伝播し、再試行は
    /// 行わない。
    ///
    /// # Returns
    /// * `Ok(Vec<MemberRecord>)` - ストアが返した順序のままの全行
    /// * `Err(StoreError)` - エラー
    pub async fn list_all(&self) -> Result<Vec<MemberRecord>, StoreError> {
        let conn = self.read_pool.get().await?;

        conn.interact(|conn| Self::execute_list(conn)).await?
    }

    /// 一覧クエリを実行（内部用）
    ///
    /// 行はステートメントのスコープ内でMemberRecordへ変換する
    /// （rusqliteの行はステートメントを借用するため外に出せない）。
    fn execute_list(conn: &Connection) -> Result<Vec<MemberRecord>, StoreError> {
        let mut stmt = conn.prepare(LIST_MEMBERS_SQL)?;
        let records = stmt
            .query_map([], member::record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// 会員を1件挿入
    ///
    /// 書き込み専用接続を1ステートメント+コミットの間だけ保持し、
    /// nameとroleを名前付きパラメータでバインドして挿入する。
    /// 採番されたidは返さない（呼び出し側はidを仮定してはならない）。
    /// エラー時はコミットされず、再試行も行わない。
    ///
    /// # Arguments
    /// * `name` - 会員名
    /// * `role` - ロール
    ///
    /// # Returns
    /// * `Ok(())` - 挿入がコミットされた
    /// * `Err(StoreError)` - エラー（未コミット）
    pub async fn insert(&self, name: &str, role: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        let role = role.to_string();
        let conn = self.write_conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .expect("会員挿入時の書き込み接続ロック取得に失敗（Mutex poisoned）");

            let tx = conn.unchecked_transaction()?;
            tx.execute(
                INSERT_MEMBER_SQL,
                named_params! { ":name": name, ":role": role },
            )?;
            tx.commit()?;

            Ok(())
        })
        .await
        .map_err(|e| StoreError::Database(format!("タスク実行エラー: {}", e)))?
    }
}
