//! Prompt templates for the RAG pipeline

/// Build the grounded-answer prompt
pub fn build_rag_prompt(
    context: &str,
    user_role: &str,
    departments: &[String],
    chat_history: &str,
    question: &str,
) -> String {
    format!(
        "You are an AI assistant that helps employees find information in company documents.\n\
         \n\
         CRITICAL RULES - FOLLOW STRICTLY:\n\
         1. ONLY use information explicitly stated in the CONTEXT below\n\
         2. DO NOT make up, invent, or assume ANY information\n\
         3. If the context doesn't answer the question, say \"I don't have that information in the available documents\"\n\
         4. Be concise - provide a clear, direct answer and STOP\n\
         5. Maximum response length: 3-4 paragraphs\n\
         \n\
         EXAMPLE OF A GOOD RESPONSE:\n\
         Question: What is our expense reimbursement deadline?\n\
         Context: Expense reports must be submitted within 30 days of the purchase date. Late submissions need director approval.\n\
         Response: Expense reports must be submitted within 30 days of purchase. Anything later requires director approval.\n\
         \n\
         EXAMPLE OF DECLINING OUT-OF-SCOPE ACCESS:\n\
         Question: What are the engineering salary bands? (asked by a Marketing user)\n\
         Context: Marketing campaign documents only.\n\
         Response: I don't have access to salary information based on your current role. Please contact HR directly.\n\
         \n\
         CONTEXT FROM DOCUMENTS:\n\
         {context}\n\
         \n\
         USER ROLE: {user_role}\n\
         ACCESSIBLE DEPARTMENTS: {departments}\n\
         \n\
         CONVERSATION HISTORY:\n\
         {chat_history}\n\
         \n\
         USER QUESTION: {question}\n\
         \n\
         RESPONSE GUIDELINES:\n\
         - Start with a direct answer to the question\n\
         - If no relevant information exists, say so clearly\n\
         - DO NOT add extra information not asked for\n\
         - STOP writing when you've answered the question\n\
         \n\
         Your Answer:",
        context = context,
        user_role = user_role,
        departments = departments.join(", "),
        chat_history = chat_history,
        question = question,
    )
}

/// Build the follow-up -> standalone question rewrite prompt
pub fn build_standalone_prompt(chat_history: &str, question: &str) -> String {
    format!(
        "Given a chat history and a follow-up question, rephrase the follow-up question \n\
         to be a standalone question that can be understood without the chat history.\n\
         \n\
         Chat History:\n\
         {chat_history}\n\
         \n\
         Follow-up Question: {question}\n\
         \n\
         Standalone Question:",
        chat_history = chat_history,
        question = question,
    )
}

/// Templated answer for queries with no relevant retrieved context
pub fn no_context_response(question: &str, departments: &[String]) -> String {
    format!(
        "The user asked: \"{question}\"\n\
         \n\
         Unfortunately, I couldn't find relevant information in the available documents to answer this question.\n\
         \n\
         This could mean:\n\
         1. The information is not in the documents you have access to\n\
         2. The question might be about a different department's data\n\
         3. The documents might not cover this specific topic\n\
         \n\
         You have access to: {departments} department documents.\n\
         \n\
         Would you like to:\n\
         - Rephrase your question?\n\
         - Ask about a different topic?\n\
         - Contact the appropriate department directly?",
        question = question,
        departments = departments.join(", "),
    )
}
