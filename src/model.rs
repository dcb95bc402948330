//! Document model: the field values of one declaration plus its logo.
//!
//! The model is a plain value. The form (or the CLI) builds a complete
//! snapshot and hands it to the preview; nothing here is persisted.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default school year shown on a fresh declaration
pub const DEFAULT_SCHOOL_YEAR: &str = "2026";

/// Default academic status shown on a fresh declaration
pub const DEFAULT_STATUS: &str = "Aprovado(a)";

const CITY: &str = "Rio de Janeiro";

const MONTHS_PT: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

/// The named fields of a declaration, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    StudentName,
    Dob,
    Guardian1,
    Guardian2,
    ClassName,
    SchoolYear,
    Status,
    CityAndDate,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::StudentName,
        Field::Dob,
        Field::Guardian1,
        Field::Guardian2,
        Field::ClassName,
        Field::SchoolYear,
        Field::Status,
        Field::CityAndDate,
    ];

    /// Key used in JSON field files
    pub fn key(self) -> &'static str {
        match self {
            Field::StudentName => "studentName",
            Field::Dob => "dob",
            Field::Guardian1 => "guardian1",
            Field::Guardian2 => "guardian2",
            Field::ClassName => "className",
            Field::SchoolYear => "schoolYear",
            Field::Status => "status",
            Field::CityAndDate => "cityAndDate",
        }
    }

    /// Form label
    pub fn label(self) -> &'static str {
        match self {
            Field::StudentName => "Nome do Aluno(a)",
            Field::Dob => "Data de Nascimento",
            Field::Guardian1 => "Responsável 1",
            Field::Guardian2 => "Responsável 2",
            Field::ClassName => "Turma / Série",
            Field::SchoolYear => "Ano Letivo",
            Field::Status => "Situação",
            Field::CityAndDate => "Cidade e Data",
        }
    }

    /// Text rendered in place of an empty value
    pub fn placeholder(self) -> &'static str {
        match self {
            Field::StudentName => "Nome do Aluno",
            Field::Dob => "Data de Nascimento",
            Field::Guardian1 => "Responsável 1",
            Field::Guardian2 => "Responsável 2",
            Field::ClassName => "Turma",
            Field::SchoolYear => "Ano Letivo",
            Field::Status => "Situação Acadêmica",
            Field::CityAndDate => "[Cidade, Data]",
        }
    }

    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }
}

/// A snapshot of every field value plus an optional logo reference.
///
/// Every value is a `String`; an empty string is a legitimate value and is
/// kept as-is. Only rendering substitutes the placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentModel {
    pub student_name: String,
    pub dob: String,
    pub guardian1: String,
    pub guardian2: String,
    pub class_name: String,
    pub school_year: String,
    pub status: String,
    pub city_and_date: String,
    /// `data:` URI or local path of a custom logo; `None` draws the built-in logo
    pub logo: Option<String>,
}

impl Default for DocumentModel {
    fn default() -> Self {
        Self::for_date(Local::now().date_naive())
    }
}

impl DocumentModel {
    /// Fresh model whose date line is computed from `date`
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            student_name: String::new(),
            dob: String::new(),
            guardian1: String::new(),
            guardian2: String::new(),
            class_name: String::new(),
            school_year: DEFAULT_SCHOOL_YEAR.to_string(),
            status: DEFAULT_STATUS.to_string(),
            city_and_date: city_and_date_line(date),
            logo: None,
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::StudentName => &self.student_name,
            Field::Dob => &self.dob,
            Field::Guardian1 => &self.guardian1,
            Field::Guardian2 => &self.guardian2,
            Field::ClassName => &self.class_name,
            Field::SchoolYear => &self.school_year,
            Field::Status => &self.status,
            Field::CityAndDate => &self.city_and_date,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::StudentName => self.student_name = value,
            Field::Dob => self.dob = value,
            Field::Guardian1 => self.guardian1 = value,
            Field::Guardian2 => self.guardian2 = value,
            Field::ClassName => self.class_name = value,
            Field::SchoolYear => self.school_year = value,
            Field::Status => self.status = value,
            Field::CityAndDate => self.city_and_date = value,
        }
    }

    /// Builder-style `set`
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// The value as it appears on the page: the placeholder when empty.
    pub fn display(&self, field: Field) -> &str {
        let value = self.get(field);
        if value.is_empty() {
            field.placeholder()
        } else {
            value
        }
    }

    /// Apply values from a JSON object keyed by field key. Unknown keys are
    /// rejected so typos surface instead of silently rendering placeholders.
    pub fn apply_json(&mut self, json: &str) -> crate::Result<()> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        for (key, value) in map {
            if key == "logo" {
                self.logo = match value {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => {
                        return Err(crate::Error::ConfigError(format!(
                            "logo must be a string or null, got {}",
                            other
                        )))
                    }
                };
                continue;
            }
            let field = Field::from_key(&key)
                .ok_or_else(|| crate::Error::ConfigError(format!("unknown field '{}'", key)))?;
            match value {
                serde_json::Value::String(s) => self.set(field, s),
                serde_json::Value::Null => self.set(field, ""),
                other => self.set(field, other.to_string()),
            }
        }
        Ok(())
    }
}

/// `Rio de Janeiro, 5 de março de 2026`
pub fn city_and_date_line(date: NaiveDate) -> String {
    let month = MONTHS_PT[date.month0() as usize];
    format!("{}, {} de {} de {}", CITY, date.day(), month, date.year())
}
