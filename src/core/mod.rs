// Core Domain
// スキーマモデル・ビルダー・入力モデル・差分モデルなどの純粋なデータ定義

pub mod ast;
pub mod builder;
pub mod config;
pub mod error;
pub mod package;
pub mod schema;
pub mod schema_diff;
