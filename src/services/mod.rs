// Services Layer
// 型正規化・スキーマ変換・差分計算・マイグレーションSQL生成を行うサービス層

pub mod dependency_order;
pub mod migration_generator;
pub mod schema_comparator;
pub mod schema_conversion;
pub mod type_normalizer;
