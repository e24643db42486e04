#[cfg(test)]
mod tests {
    use crate::schemas::ApiDoc;
    use utoipa::OpenApi;
    use utoipa::openapi::PathItemType;

    #[test]
    fn test_openapi_schema_generation() {
        let openapi = ApiDoc::openapi();

        assert!(openapi.components.is_some());
        let components = openapi.components.as_ref().unwrap();

        for name in [
            "ErrorResponse",
            "HealthResponse",
            "LoginRequest",
            "RegisterUserRequest",
            "CreateCaseRequest",
            "CreateCompositeRequest",
            "RevisionRequest",
            "GenerationTicket",
        ] {
            assert!(components.schemas.contains_key(name), "missing schema {}", name);
        }

        assert!(serde_json::to_string(&openapi).is_ok());
    }

    #[test]
    fn test_error_response_schema_structure() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let error_response_schema = components.schemas.get("ErrorResponse").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = error_response_schema {
            let properties = &obj.properties;
            assert!(properties.contains_key("error"));
            assert!(properties.contains_key("code"));
            assert!(properties.contains_key("success"));
        } else {
            panic!("ErrorResponse should be an object schema");
        }
    }

    #[test]
    fn test_health_response_reports_model_state() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.as_ref().unwrap();
        let schema = components.schemas.get("HealthResponse").unwrap();

        if let utoipa::openapi::RefOr::T(utoipa::openapi::schema::Schema::Object(obj)) = schema {
            let properties = &obj.properties;
            assert!(properties.contains_key("status"));
            assert!(properties.contains_key("database"));
            assert!(properties.contains_key("model_loaded"));
        } else {
            panic!("HealthResponse should be an object schema");
        }
    }

    #[test]
    fn test_openapi_paths_cover_the_api() {
        let openapi = ApiDoc::openapi();
        let paths = &openapi.paths.paths;

        let expected = [
            ("/health", PathItemType::Get),
            ("/api/v1/auth/login", PathItemType::Post),
            ("/api/v1/auth/logout", PathItemType::Post),
            ("/api/v1/auth/me", PathItemType::Get),
            ("/api/v1/users", PathItemType::Post),
            ("/api/v1/users", PathItemType::Get),
            ("/api/v1/dashboard", PathItemType::Get),
            ("/api/v1/cases", PathItemType::Get),
            ("/api/v1/cases", PathItemType::Post),
            ("/api/v1/cases/{case_id}", PathItemType::Get),
            ("/api/v1/cases/{case_id}/composites", PathItemType::Get),
            ("/api/v1/cases/{case_id}/composites", PathItemType::Post),
            ("/api/v1/composites/{composite_id}", PathItemType::Get),
            ("/api/v1/composites/{composite_id}/accurate", PathItemType::Post),
            ("/api/v1/composites/{composite_id}/revisions", PathItemType::Post),
        ];
        for (path, method) in expected {
            let item = paths.get(path).unwrap_or_else(|| panic!("missing path {}", path));
            let verb = match method {
                PathItemType::Get => "GET",
                PathItemType::Post => "POST",
                _ => "other",
            };
            assert!(item.operations.contains_key(&method), "missing {} {}", verb, path);
        }
    }

    #[test]
    fn test_generation_endpoints_answer_accepted() {
        let openapi = ApiDoc::openapi();
        let item = openapi.paths.paths.get("/api/v1/cases/{case_id}/composites").unwrap();
        let post = item.operations.get(&PathItemType::Post).unwrap();
        assert!(post.responses.responses.contains_key("202"));
        assert!(post.responses.responses.contains_key("403"));
    }

    #[test]
    fn test_all_error_responses_reference_correct_schema() {
        let openapi = ApiDoc::openapi();
        let openapi_json = serde_json::to_string(&openapi).unwrap();

        assert!(!openapi_json.contains("crate.schemas.ErrorResponse"));
        assert!(!openapi_json.contains("crate::schemas::ErrorResponse"));
        assert!(openapi_json.contains("ErrorResponse"));
    }
}
