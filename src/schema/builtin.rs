//! Rule tables for the built-in document types.

use crate::schema::rules::{
    ColumnCorrections, ColumnSelection, DerivedRule, MissingColumnPolicy, RowFilter,
};
use crate::schema::{DocumentSchema, DocumentType, OutputSpec};

pub const PERIOD_COLUMN: &str = "Mes";

const SEGMENT_CORRECTIONS: &[(&str, &str)] = &[
    ("Reposicisn", "Reposicion"),
    ("AU Multimisisn", "AU Multimision"),
    ("Servicios de Alimentacisn", "Servicios de Alimentacion"),
];

pub static CUSTOMERS: DocumentSchema = DocumentSchema {
    document: DocumentType::Customers,
    required: &[
        "Codigo Ecom",
        "Sucursal",
        "Documento",
        "Ra. Social",
        "Nombre Neg",
        "Dpto",
        "Ciudad",
        "Barrio",
        "Segmento",
        "Fecha",
        "Coordenada Y",
        "Coordenada X",
        "Exhibidor",
        "Cod.Asesor",
        "Asesor",
        "Coordenadas Gis",
        "Socios Nutresa",
    ],
    selection: ColumnSelection::Required,
    missing: MissingColumnPolicy::FillEmpty,
    renames: &[("Cod. Asesor", "Cod.Asesor")],
    filters: &[],
    corrections: &[
        ColumnCorrections {
            column: "Ciudad",
            table: &[("MOQITOS", "MONITOS")],
        },
        ColumnCorrections {
            column: "Segmento",
            table: &[
                ("Reposicisn", "Reposicion"),
                ("AU Multimisisn", "AU Multimision"),
                ("Servicios de Alimentacisn", "Servicios de Alimentacion"),
                ("Centros de diversisn", "Centros de diversion"),
            ],
        },
    ],
    derived: &[
        DerivedRule::IntegerText {
            column: "Codigo Ecom",
        },
        DerivedRule::IntegerText {
            column: "Documento",
        },
        DerivedRule::IntegerText {
            column: "Exhibidor",
        },
        DerivedRule::IntegerText {
            column: "Cod.Asesor",
        },
        DerivedRule::DayMonthYear { column: "Fecha" },
    ],
    identity: None,
    period_column: None,
    output: OutputSpec {
        file_name: "maestra_clientes.csv",
        delimiter: b',',
        byte_order_mark: true,
    },
};

pub static SALES_BY_MATERIAL: DocumentSchema = DocumentSchema {
    document: DocumentType::SalesByMaterial,
    required: &[
        "Cliente",
        "Nombre",
        "Razon Social",
        "Documento",
        "Barrio",
        "Nombre Segmento",
        "Producto",
        "Nombre.1",
        "Cant. pedida",
        "Cant. devuelta",
        "Cantidad neta",
        "IVA",
        "Venta - IVA",
        "Marca",
        "Sub marca",
        "Linea",
        "Sub linea",
        "Categoria",
        "Sub categoria",
        "Negocio",
        "Vendedor",
        "Ciudad",
    ],
    selection: ColumnSelection::Required,
    missing: MissingColumnPolicy::Reject,
    renames: &[],
    filters: &[RowFilter::Exclude {
        column: "Vendedor",
        value: "99 - SERVICIOS",
    }],
    corrections: &[
        ColumnCorrections {
            column: "Categoria",
            table: &[
                ("10-Cafi", "10-Cafe"),
                ("51-Ti e infusiones", "51-Te e infusiones"),
                ("61-Equipos Preparacisn", "61-Equipos Preparacion"),
                ("06-Champiqones", "06-Champinones"),
                ("09-Bebidas dechocolate", "09-Bebidas de chocolate"),
            ],
        },
        ColumnCorrections {
            column: "Nombre Segmento",
            table: SEGMENT_CORRECTIONS,
        },
        ColumnCorrections {
            column: "Marca",
            table: &[
                ("026-Colcafi", "026-Colcafe"),
                ("001-Zenz", "001-Zenu"),
                ("351-Genirico otros distibuidos", "351-Generico otros distribuidos"),
                ("373-Binet", "373-Benet"),
            ],
        },
        ColumnCorrections {
            column: "Sub marca",
            table: &[
                ("01-Colcafi", "01-Colcafe"),
                ("02-Zenz", "01-Zenu"),
                ("01-Genirico otros distibuidos", "01-Generico otros distribuidos"),
                ("01-Binet", "01-Benet"),
                ("10-Lechey calcio", "10-Leche y calcio"),
                ("04-Lechecon almendras", "04-Leche con almendras"),
                ("12-Quesoy Mantequilla", "12-Queso y Mantequilla"),
                ("08-Gool", "08-Gol"),
            ],
        },
        ColumnCorrections {
            column: "Negocio",
            table: &[
                ("04-Cafi", "04-Cafe"),
                ("23-Nutricisn Experta", "23-Nutricion Experta"),
            ],
        },
    ],
    derived: &[
        DerivedRule::InsertPeriod {
            column: PERIOD_COLUMN,
            position: 1,
        },
        DerivedRule::SplitFirst {
            source: "Vendedor",
            delimiter: '-',
            left: "Cod. Asesor",
            right: "Asesor",
        },
        DerivedRule::KeepAfterFirst {
            column: "Ciudad",
            delimiter: '-',
        },
        DerivedRule::ScaledDecimal {
            column: "Venta - IVA",
            divisor: 100.0,
            decimals: 2,
            decimal_separator: ',',
        },
    ],
    identity: None,
    period_column: Some(PERIOD_COLUMN),
    output: OutputSpec {
        file_name: "ventas_mes.csv",
        delimiter: b',',
        byte_order_mark: true,
    },
};

pub static DISPLAYS: DocumentSchema = DocumentSchema {
    document: DocumentType::Displays,
    required: &["Numero", "Cod. Cliente", "Num. Comodato", "Estado", "Tipo"],
    selection: ColumnSelection::All,
    missing: MissingColumnPolicy::Reject,
    renames: &[],
    filters: &[
        RowFilter::Require {
            column: "Estado",
            value: "A",
        },
        RowFilter::Exclude {
            column: "Tipo",
            value: "40089999-MUEBLE SNACKERO ABARROTERO MOSTRADOR",
        },
    ],
    corrections: &[],
    derived: &[
        DerivedRule::StripChars {
            column: "Num. Comodato",
            chars: &[';'],
        },
        DerivedRule::Classify {
            source: "Tipo",
            target: "Categoria",
            needle: "NEVERA",
            matched: "Nevera",
            otherwise: "Snackero",
            overrides: &[
                "40089141-MUEBLE SNACKERO PISO GRANDE CON NEVERA",
                "40089142-MUEBLE SNACKERO PISO CON NEVERA",
            ],
        },
        DerivedRule::IntegerText {
            column: "Cod. Cliente",
        },
        DerivedRule::IntegerText { column: "Numero" },
    ],
    identity: Some("Numero"),
    period_column: None,
    output: OutputSpec {
        file_name: "Exhibidores.csv",
        delimiter: b',',
        byte_order_mark: false,
    },
};

pub static SALES_UNION: DocumentSchema = DocumentSchema {
    document: DocumentType::SalesUnion,
    required: &[PERIOD_COLUMN],
    selection: ColumnSelection::All,
    missing: MissingColumnPolicy::Reject,
    renames: &[],
    filters: &[],
    corrections: &[],
    derived: &[],
    identity: None,
    period_column: Some(PERIOD_COLUMN),
    output: OutputSpec {
        file_name: "ventas_acum.csv",
        delimiter: b',',
        byte_order_mark: true,
    },
};

#[cfg(test)]
mod tests {
    use super::{CUSTOMERS, DISPLAYS, SALES_BY_MATERIAL, SALES_UNION};
    use crate::schema::DocumentSchema;
    use std::collections::HashSet;

    const ALL: [&DocumentSchema; 4] = [&CUSTOMERS, &SALES_BY_MATERIAL, &DISPLAYS, &SALES_UNION];

    #[test]
    fn required_columns_are_unique() {
        for schema in ALL {
            let unique: HashSet<_> = schema.required.iter().collect();
            assert_eq!(unique.len(), schema.required.len(), "{}", schema.document);
        }
    }

    #[test]
    fn correction_keys_are_unique_per_column() {
        for schema in ALL {
            for corrections in schema.corrections {
                let keys: HashSet<_> = corrections.table.iter().map(|(from, _)| from).collect();
                assert_eq!(keys.len(), corrections.table.len(), "{}", corrections.column);
            }
        }
    }

    #[test]
    fn corrected_and_filtered_columns_survive_selection() {
        for schema in ALL {
            let referenced = schema
                .corrections
                .iter()
                .map(|corrections| corrections.column)
                .chain(schema.filters.iter().map(|filter| filter.column()));
            for column in referenced {
                assert!(schema.required.contains(&column), "{column} not required");
            }
        }
    }

    #[test]
    fn derived_inputs_are_required_columns() {
        for schema in ALL {
            for rule in schema.derived {
                for column in rule.inputs() {
                    assert!(
                        schema.required.contains(column),
                        "{}: {column} feeds {rule:?} but is not required",
                        schema.document
                    );
                }
            }
        }
    }

    #[test]
    fn output_names_are_distinct() {
        let names: HashSet<_> = ALL.iter().map(|schema| schema.output.file_name).collect();
        assert_eq!(names.len(), ALL.len());
    }
}
