// スキーマビルダー
//
// テストやプログラムからASTを組み立てるためのフルエントAPIを提供します。
// 各メソッドは属性を設定するだけなので、呼び出し順序に関わらず
// 同じ属性を設定すれば同じモデルが得られます。

use crate::core::ast::{
    ColumnNode, CommentNode, ConstraintNode, CreateTableNode, DefaultValue, EnumNode,
    ForeignKeyRef, IndexNode, Node,
};

/// スキーマ全体のビルダー
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    nodes: Vec<Node>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// ENUM型を追加
    pub fn enumeration(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.nodes.push(Node::Enum(EnumNode {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }));
        self
    }

    /// コメント行を追加
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.nodes.push(Node::Comment(CommentNode { text: text.into() }));
        self
    }

    /// テーブル定義を開始
    pub fn table(self, name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            parent: self,
            table: CreateTableNode::new(name),
            indexes: Vec::new(),
        }
    }

    /// 構築済みのノードを追加
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// ノード列を返す
    pub fn build(self) -> Vec<Node> {
        self.nodes
    }
}

/// テーブルのビルダー
#[derive(Debug, Clone)]
pub struct TableBuilder {
    parent: SchemaBuilder,
    table: CreateTableNode,
    indexes: Vec<IndexNode>,
}

impl TableBuilder {
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.table.comment = Some(comment.into());
        self
    }

    /// テーブルオプション（ENGINE等）を設定
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.table.options.insert(key.into(), value.into());
        self
    }

    /// カラム定義を開始
    pub fn column(self, name: impl Into<String>, column_type: impl Into<String>) -> ColumnBuilder {
        ColumnBuilder {
            table: self,
            column: ColumnNode::new(name, column_type),
        }
    }

    /// 複合プライマリキー
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.table
            .constraints
            .push(ConstraintNode::primary_key(to_strings(columns)));
        self
    }

    /// テーブルレベルのUNIQUE制約
    pub fn unique_constraint(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.table
            .constraints
            .push(ConstraintNode::unique(Some(name.into()), to_strings(columns)));
        self
    }

    /// テーブルレベルのCHECK制約
    pub fn check(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.table
            .constraints
            .push(ConstraintNode::check(Some(name.into()), expression));
        self
    }

    /// インデックス定義を開始
    pub fn index(self, name: impl Into<String>, columns: &[&str]) -> IndexBuilder {
        let index = IndexNode {
            name: name.into(),
            table: self.table.name.clone(),
            columns: to_strings(columns),
            unique: false,
        };
        IndexBuilder { table: self, index }
    }

    /// テーブル定義を終了
    ///
    /// CREATE TABLEノードの後に、このテーブルのインデックスノードが続きます。
    pub fn end(self) -> SchemaBuilder {
        let mut parent = self.parent;
        parent.nodes.push(Node::CreateTable(self.table));
        parent
            .nodes
            .extend(self.indexes.into_iter().map(Node::Index));
        parent
    }

    /// 構築中のテーブル定義のみを取り出す
    pub fn into_table(self) -> CreateTableNode {
        self.table
    }
}

/// カラムのビルダー
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    table: TableBuilder,
    column: ColumnNode,
}

impl ColumnBuilder {
    pub fn primary(mut self) -> Self {
        self.column.primary = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.column.nullable = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.column.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.column.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.column.auto_increment = true;
        self
    }

    /// リテラルのデフォルト値
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.column.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// 関数式のデフォルト値
    pub fn default_function(mut self, expression: impl Into<String>) -> Self {
        self.column.default = Some(DefaultValue::Function(expression.into()));
        self
    }

    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.column.check = Some(expression.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.column.comment = Some(comment.into());
        self
    }

    /// 外部キー参照
    pub fn foreign_key(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        let previous = self.column.foreign_key.take();
        let mut fk = ForeignKeyRef::new(table, column);
        if let Some(previous) = previous {
            fk.name = previous.name;
            fk.on_delete = previous.on_delete;
            fk.on_update = previous.on_update;
        }
        self.column.foreign_key = Some(fk);
        self
    }

    /// 外部キー制約名
    pub fn foreign_key_name(mut self, name: impl Into<String>) -> Self {
        self.pending_foreign_key().name = Some(name.into());
        self
    }

    pub fn on_delete(mut self, action: impl Into<String>) -> Self {
        self.pending_foreign_key().on_delete = Some(action.into());
        self
    }

    pub fn on_update(mut self, action: impl Into<String>) -> Self {
        self.pending_foreign_key().on_update = Some(action.into());
        self
    }

    /// 方言ごとの型オーバーライド
    pub fn type_override(
        mut self,
        dialect: impl Into<String>,
        column_type: impl Into<String>,
    ) -> Self {
        self.column
            .type_overrides
            .insert(dialect.into(), column_type.into());
        self
    }

    /// カラム定義を終了
    pub fn end(self) -> TableBuilder {
        let mut table = self.table;
        table.table.columns.push(self.column);
        table
    }

    /// 構築中のカラム定義のみを取り出す
    pub fn into_column(self) -> ColumnNode {
        self.column
    }

    // 参照先未設定のまま名前やアクションを指定された場合は空の参照を用意し、
    // 後続の foreign_key() で参照先が埋まる
    fn pending_foreign_key(&mut self) -> &mut ForeignKeyRef {
        self.column
            .foreign_key
            .get_or_insert_with(|| ForeignKeyRef::new("", ""))
    }
}

/// インデックスのビルダー
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    table: TableBuilder,
    index: IndexNode,
}

impl IndexBuilder {
    pub fn unique(mut self) -> Self {
        self.index.unique = true;
        self
    }

    /// インデックス定義を終了
    pub fn end(self) -> TableBuilder {
        let mut table = self.table;
        table.indexes.push(self.index);
        table
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
