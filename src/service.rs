//! 会員サービス
//!
//! 一覧取得と作成のオーケストレーションを提供する。
//! 入力検証はここで行い、検証を通らないリクエストはストアに
//! 一切到達させない。

use std::sync::Arc;

use thiserror::Error;

use crate::member::{MemberRecord, NewMember};
use crate::store::{SqliteMemberStore, StoreError};

/// 会員サービスエラー
#[derive(Debug, Error)]
pub enum MemberError {
    /// 入力検証エラー（ストアには到達していない）
    #[error("{0}")]
    Validation(String),

    /// ストアエラー（そのまま伝播）
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 会員サービス
///
/// ストアはmainで構築されたものを注入する。サービス自身は
/// リクエストをまたぐ状態を一切持たない。
pub struct MemberService {
    /// SQLite会員ストア
    store: Arc<SqliteMemberStore>,
}

impl MemberService {
    /// 新しいMemberServiceを作成
    ///
    /// # Arguments
    /// * `store` - SQLite会員ストア
    pub fn new(store: Arc<SqliteMemberStore>) -> Self {
        Self { store }
    }

    /// 全会員を一覧取得
    ///
    /// ストアが返した順序をそのまま保持する（並べ替えしない）。
    /// 0件の場合は空のVecを返す。
    ///
    /// # Returns
    /// * `Ok(Vec<MemberRecord>)` - `[id, name, role]` 形式の全行
    /// * `Err(MemberError::Store)` - ストアエラー
    pub async fn list_members(&self) -> Result<Vec<MemberRecord>, MemberError> {
        Ok(self.store.list_all().await?)
    }

    /// 会員を作成
    ///
    /// nameとroleが空でないことを検証してからストアに挿入する。
    /// 検証エラー時はストアを呼び出さない。成功時は検証済みの
    /// 入力をそのままエコーバックする（idはストア採番のため
    /// 含まない）。
    ///
    /// # Arguments
    /// * `input` - 会員作成リクエスト
    ///
    /// # Returns
    /// * `Ok(NewMember)` - 作成された会員（入力のエコー）
    /// * `Err(MemberError::Validation)` - 検証エラー
    /// * `Err(MemberError::Store)` - ストアエラー
    pub async fn create_member(&self, input: NewMember) -> Result<NewMember, MemberError> {
        if input.name.is_empty() {
            return Err(MemberError::Validation(
                "name は空文字列にできません".to_string(),
            ));
        }
        if input.role.is_empty() {
            return Err(MemberError::Validation(
                "role は空文字列にできません".to_string(),
            ));
        }

        self.store.insert(&input.name, &input.role).await?;

        Ok(input)
    }
}
