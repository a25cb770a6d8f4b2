use crate::schema::{DbType, Kind};

/// Map a native column type reported by `db_type` to its kind.
///
/// Only the text before `(` is considered. `varchar_size` distinguishes
/// SQL Server's `nvarchar(max)` (reported as -1) from sized columns.
pub fn kind_for(db_type: DbType, native: &str, varchar_size: Option<i64>) -> Option<Kind> {
    let lowered = native.to_lowercase();
    let base = lowered.split('(').next().unwrap_or("").trim();

    let kind = match db_type {
        DbType::Postgres => match base {
            "uuid" => Kind::UUID,
            "date" => Kind::Date,
            "time without time zone" | "time with time zone" | "time" => Kind::Time,
            "character varying" | "varchar" => Kind::VarChar,
            "character" | "char" | "bpchar" => Kind::Char,
            "text" | "name" => Kind::String,
            "integer" | "serial" | "int" | "int4" => Kind::Integer,
            "smallint" | "smallserial" | "int2" => Kind::SmallInteger,
            "bigint" | "bigserial" | "int8" => Kind::BigInteger,
            "numeric" | "decimal" => Kind::Decimal,
            "real" | "double precision" | "float4" | "float8" => Kind::Float,
            "timestamp without time zone" | "timestamp" => Kind::DateTime,
            "timestamp with time zone" | "timestamptz" => Kind::DateTimeWithZone,
            "boolean" | "bool" => Kind::Boolean,
            "jsonb" | "json" => Kind::JSON,
            _ => return None,
        },
        DbType::MySQL => match base {
            "date" => Kind::Date,
            "time" => Kind::Time,
            "varchar" => Kind::VarChar,
            "char" => Kind::Char,
            "tinytext" | "text" | "mediumtext" | "longtext" => Kind::String,
            "smallint" => Kind::SmallInteger,
            "bigint" => Kind::BigInteger,
            "mediumint" | "int" | "integer" => Kind::Integer,
            "float" | "double" => Kind::Float,
            "decimal" => Kind::Decimal,
            "datetime" => Kind::DateTime,
            "timestamp" => Kind::DateTimeWithZone,
            "bit" | "tinyint" => Kind::Boolean,
            "json" => Kind::JSON,
            _ => return None,
        },
        DbType::SQLServer => match base {
            "date" => Kind::Date,
            "time" => Kind::Time,
            "varchar" | "nvarchar" if varchar_size == Some(-1) => Kind::String,
            "varchar" | "nvarchar" => Kind::VarChar,
            "char" | "nchar" => Kind::Char,
            "text" | "ntext" => Kind::String,
            "smallint" => Kind::SmallInteger,
            "bigint" => Kind::BigInteger,
            "int" => Kind::Integer,
            "numeric" | "decimal" => Kind::Decimal,
            "float" | "real" => Kind::Float,
            "datetime" | "datetime2" | "smalldatetime" => Kind::DateTime,
            "datetimeoffset" => Kind::DateTimeWithZone,
            "bit" | "tinyint" => Kind::Boolean,
            "json" => Kind::JSON,
            _ => return None,
        },
        DbType::Mongo | DbType::Embedded => return None,
    };
    Some(kind)
}
