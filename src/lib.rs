// Ptahライブラリのエントリーポイント
//
// モジュール構造:
// - core: スキーマAST、入力モデル、実スキーマモデル、差分モデル、エラー、接続設定
// - adapters: 方言レンダラー、データベース接続、スキーマ読み取り・書き込み
// - services: 型正規化、スキーマ変換、差分計算、マイグレーションSQL生成

pub mod adapters;
pub mod core;
pub mod services;

pub use crate::core::config::{ConnectionConfig, Dialect};
pub use crate::core::error::{PtahError, RenderError};
