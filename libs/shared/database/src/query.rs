use std::fmt::Display;

/// Builds PostgREST request paths: `/rest/v1/<table>?select=..&col=op.value&order=..`.
#[derive(Debug, Clone)]
pub struct PostgrestQuery {
    table: String,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
}

impl PostgrestQuery {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            select: None,
            filters: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Column list, including embedded relations such as `*, Patient(FirstName, LastName)`.
    pub fn select(mut self, columns: &str) -> Self {
        let compact: String = columns.chars().filter(|c| !c.is_whitespace()).collect();
        self.select = Some(compact);
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "neq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: impl Display) -> Self {
        let encoded = urlencoding::encode(&value.to_string()).into_owned();
        self.filters.push((column.to_string(), format!("{}.{}", operator, encoded)));
        self
    }

    pub fn to_path(&self) -> String {
        let mut params = Vec::new();

        if let Some(select) = &self.select {
            params.push(format!("select={}", select));
        }
        for (column, condition) in &self.filters {
            params.push(format!("{}={}", column, condition));
        }
        if !self.order.is_empty() {
            params.push(format!("order={}", self.order.join(",")));
        }

        if params.is_empty() {
            format!("/rest/v1/{}", self.table)
        } else {
            format!("/rest/v1/{}?{}", self.table, params.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_joined_select_with_filters_and_order() {
        let path = PostgrestQuery::table("Consultation")
            .select("*, Patient(FirstName, LastName), Diagnosis(*)")
            .eq("DentistId", 7)
            .order("AppointmentDate", true)
            .to_path();

        assert_eq!(
            path,
            "/rest/v1/Consultation?select=*,Patient(FirstName,LastName),Diagnosis(*)&DentistId=eq.7&order=AppointmentDate.asc"
        );
    }

    #[test]
    fn encodes_filter_values() {
        let path = PostgrestQuery::table("Consultation")
            .neq("Status", "partially complete")
            .eq("Email", "jo+1@example.com")
            .to_path();

        assert_eq!(
            path,
            "/rest/v1/Consultation?Status=neq.partially%20complete&Email=eq.jo%2B1%40example.com"
        );
    }

    #[test]
    fn bare_table_has_no_query_string() {
        assert_eq!(PostgrestQuery::table("Dentist").to_path(), "/rest/v1/Dentist");
    }

    #[test]
    fn range_filters_keep_their_order_before_sorting() {
        let path = PostgrestQuery::table("DentistAvailability")
            .gte("Date", "2025-06-01")
            .lte("Date", "2025-06-30")
            .order("Date", true)
            .to_path();

        assert_eq!(
            path,
            "/rest/v1/DentistAvailability?Date=gte.2025-06-01&Date=lte.2025-06-30&order=Date.asc"
        );
    }
}
