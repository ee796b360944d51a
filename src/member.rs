//! 会員エンティティとレコード変換
//!
//! ストアの行（位置ベースのタプル）とAPIレスポンスの
//! `[id, name, role]` 形式との間の変換を提供する。

use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// 会員レコード
///
/// 一覧APIのレスポンス要素。タプル構造体のため、JSONでは
/// `[id, name, role]` の3要素配列としてシリアライズされる。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberRecord(pub i64, pub String, pub String);

impl MemberRecord {
    /// 会員ID（ストア採番）を取得
    pub fn id(&self) -> i64 {
        self.0
    }

    /// 会員名を取得
    pub fn name(&self) -> &str {
        &self.1
    }

    /// ロールを取得
    pub fn role(&self) -> &str {
        &self.2
    }
}

/// ストアの行をMemberRecordに変換する
///
/// 行は順序付きタプルとして扱い、必ず位置で読み取る
/// （0 = id, 1 = name, 2 = role）。カラム名には依存しない。
/// 検証は行わない構造変換のみ。
///
/// # Arguments
/// * `row` - `SELECT * FROM member` が返した行
///
/// # Returns
/// * `Ok(MemberRecord)` - 変換成功
/// * `Err(rusqlite::Error)` - 型不一致等の行読み取りエラー
pub fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MemberRecord> {
    Ok(MemberRecord(row.get(0)?, row.get(1)?, row.get(2)?))
}

/// 会員作成リクエスト
///
/// `POST /member` のリクエストボディ。`id`はストアが採番するため
/// 含まない。作成成功時はこの形のままエコーバックされる。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMember {
    /// 会員名（空文字列は不可）
    pub name: String,
    /// ロール（自由形式、空文字列は不可）
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    /// テスト用のインメモリDBにmemberテーブルを作成
    fn memory_db_with_member_table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE member (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                role TEXT NOT NULL
            )",
        )
        .unwrap();
        conn
    }

    // ========================================
    // record_from_rowのテスト
    // ========================================

    /// 行が位置順 [id, name, role] で変換されることを確認
    #[test]
    fn test_record_from_row_maps_positionally() {
        let conn = memory_db_with_member_table();
        conn.execute(
            "INSERT INTO member (name, role) VALUES ('Tommy', 'designer')",
            [],
        )
        .unwrap();

        let record = conn
            .query_row("SELECT * FROM member", [], record_from_row)
            .unwrap();

        assert_eq!(record.id(), 1);
        assert_eq!(record.name(), "Tommy");
        assert_eq!(record.role(), "designer");
    }

    /// カラムの選択順がそのまま位置として解釈されることを確認
    /// （名前ではなく位置で読むため、順序を入れ替えると値も入れ替わる）
    #[test]
    fn test_record_from_row_is_order_dependent() {
        let conn = memory_db_with_member_table();
        conn.execute(
            "INSERT INTO member (name, role) VALUES ('Tommy', 'designer')",
            [],
        )
        .unwrap();

        let record = conn
            .query_row("SELECT id, role, name FROM member", [], record_from_row)
            .unwrap();

        // 位置1に来たroleがnameとして読まれる
        assert_eq!(record.name(), "designer");
        assert_eq!(record.role(), "Tommy");
    }

    /// 型が合わない行の変換がエラーになることを確認
    #[test]
    fn test_record_from_row_type_mismatch_fails() {
        let conn = memory_db_with_member_table();

        // idの位置に文字列を置く
        let result = conn.query_row(
            "SELECT 'not_an_id', 'Tommy', 'designer'",
            [],
            record_from_row,
        );

        assert!(result.is_err(), "型不一致の行が変換できてしまった");
    }

    // ========================================
    // JSONシリアライズのテスト
    // ========================================

    /// MemberRecordが3要素のJSON配列にシリアライズされることを確認
    #[test]
    fn test_member_record_serializes_to_triple() {
        let record = MemberRecord(1, "Tommy".to_string(), "designer".to_string());
        let json = serde_json::to_string(&record).unwrap();

        assert_eq!(json, r#"[1,"Tommy","designer"]"#);
    }

    /// JSON配列からMemberRecordにデシリアライズできることを確認
    #[test]
    fn test_member_record_deserializes_from_triple() {
        let record: MemberRecord =
            serde_json::from_str(r#"[42,"Alice","manager"]"#).unwrap();

        assert_eq!(record, MemberRecord(42, "Alice".to_string(), "manager".to_string()));
    }

    /// NewMemberがname/role両フィールド必須でデシリアライズされることを確認
    #[test]
    fn test_new_member_requires_both_fields() {
        let ok: Result<NewMember, _> =
            serde_json::from_str(r#"{"name":"Tommy","role":"designer"}"#);
        assert!(ok.is_ok());

        let missing_role: Result<NewMember, _> = serde_json::from_str(r#"{"name":"Tommy"}"#);
        assert!(missing_role.is_err(), "roleなしでデシリアライズできてしまった");

        let null_name: Result<NewMember, _> =
            serde_json::from_str(r#"{"name":null,"role":"designer"}"#);
        assert!(null_name.is_err(), "nullのnameでデシリアライズできてしまった");
    }

    /// NewMemberのエコーバックがフィールド名付きJSONになることを確認
    #[test]
    fn test_new_member_serializes_with_field_names() {
        let input = NewMember {
            name: "Tommy".to_string(),
            role: "designer".to_string(),
        };
        let json = serde_json::to_value(&input).unwrap();

        assert_eq!(json, serde_json::json!({"name": "Tommy", "role": "designer"}));
    }
}
