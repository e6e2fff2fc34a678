use redb::TableDefinition;

use super::models::OwnerKind;

/// Owner tables: owner id -> OwnerRecord (msgpack)
pub const EXPENDITURES: TableDefinition<&str, &[u8]> = TableDefinition::new("expenditures");

pub const PLACEMENT_APPLICATIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("placement_applications");

pub const STUDENT_INTERNSHIPS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("student_internships");

pub fn owner_table(kind: OwnerKind) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match kind {
        OwnerKind::Expenditure => EXPENDITURES,
        OwnerKind::PlacementApplication => PLACEMENT_APPLICATIONS,
        OwnerKind::StudentInternship => STUDENT_INTERNSHIPS,
    }
}
