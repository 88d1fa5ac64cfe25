// Adapters Layer
// データベース接続・カタログ読み込み・DDL実行・方言別SQL描画を行うアダプター層

pub mod connection_string;
pub mod database;
pub mod renderer;
pub mod schema_reader;
pub mod schema_writer;
pub mod sql_quote;
